//! Exchange configuration.

/// Default table backing an exchange.
pub const DEFAULT_TABLE: &str = "messages";

/// Exchange configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Name of the table the exchange owns. Doubles as the exchange name.
    pub table: String,

    /// Create the table on open if it is missing.
    pub create_table: bool,
}

impl ExchangeConfig {
    /// Create a configuration for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            create_table: true,
        }
    }

    /// Require the table to exist already.
    pub fn without_table_creation(mut self) -> Self {
        self.create_table = false;
        self
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}
