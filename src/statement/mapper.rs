//! Mapping raw rows onto line items

use tracing::debug;

use crate::parsing::{parse_amount, DateTemplate, NumberFormat, ParsedDate};
use crate::types::*;

/// Maps rows of one statement using a validated column configuration
#[derive(Debug, Clone)]
pub struct RowMapper {
    config: ColumnConfig,
    template: DateTemplate,
    number_format: NumberFormat,
}

impl RowMapper {
    /// Validate the configuration and compile its date template
    pub fn new(config: ColumnConfig) -> ReconResult<Self> {
        config.validate()?;
        let template = DateTemplate::compile(config.date_template()?)?;
        let number_format = config.number_format();
        Ok(Self {
            config,
            template,
            number_format,
        })
    }

    pub fn config(&self) -> &ColumnConfig {
        &self.config
    }

    pub fn date_template(&self) -> &DateTemplate {
        &self.template
    }

    fn cell<'a>(&self, row: &'a RawRow, header: Option<&str>) -> &'a str {
        header
            .and_then(|h| row.get(h))
            .map(str::trim)
            .unwrap_or("")
    }

    /// Map one row. Unparseable dates become an `invalid-date` flag, never an error.
    pub fn map_row(&self, statement_id: &str, row: &RawRow) -> LineItem {
        let mut item = LineItem::new(statement_id, row.ordinal);
        item.raw = row.cells.clone();
        item.number = self.cell(row, self.config.number_header()).to_string();
        item.reference = self.cell(row, self.config.reference_header()).to_string();

        let date_text = self.cell(row, self.config.date_header());
        match self.template.parse(date_text) {
            ParsedDate::Date(date) => item.date = Some(date),
            ParsedDate::Unparseable => {
                debug!(item_id = %item.item_id, value = date_text, "Invalid date");
                item.add_flag(
                    Flag::InvalidDate,
                    FlagDetail::new("date", Flag::InvalidDate.code()).with_value(date_text),
                );
            }
            ParsedDate::Blank => {}
        }

        item.due_date = self
            .template
            .parse(self.cell(row, self.config.due_date_header()))
            .date();

        for column in self.config.amount_columns() {
            let label = column.column.trim();
            if let Some(amount) = row
                .get(label)
                .and_then(|cell| parse_amount(cell, &self.number_format))
            {
                item.total.insert(label.to_string(), amount);
            }
        }

        item
    }

    /// Map every non-blank row
    pub fn map_rows(&self, statement_id: &str, rows: &[RawRow]) -> Vec<LineItem> {
        rows.iter()
            .filter(|row| !row.is_blank())
            .map(|row| self.map_row(statement_id, row))
            .collect()
    }
}
