/// Implements [Table](crate::database::Table) for a model that stores its id in a [Record](crate::database::Record) field.
///
/// # Example
///
/// ```rust,ignore
/// define_table!("statistics": Statistic = id);
///
/// assert_eq!(Statistic::table(), "statistics");
/// ```
#[macro_export]
macro_rules! define_table {
    ($table:literal: $model:ty = $id:ident) => {
        impl $crate::database::Table for $model {
            fn id(&self) -> &$crate::database::Thing {
                self.$id.as_ref()
            }

            fn table() -> &'static str {
                $table
            }
        }
    };
}
