use adstats::api::{self, App};
use adstats::database::Database;
use adstats::error::ApplicationError;
use adstats::{config, logger};
use dotenvy::dotenv;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = config::load()?;

    let _guard = logger::init(&config)?;

    let database = Database::connect(&config.database).await?;

    api::serve(config.host_address, App::new(database)).await
}
