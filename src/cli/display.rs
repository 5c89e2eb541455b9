use prettytable::{cell, format, row, Row, Table};

use crate::importer::FailedRoute;

pub(super) trait ToRow {
    fn columns() -> Row;
    fn to_row(&self) -> Row;
}

/// Print `rows` under a title line, nothing when empty
pub(super) fn print_table<'a, T, I>(rows: I)
where
    T: ToRow + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut table = Table::new();
    table.set_format(
        format::FormatBuilder::new()
            .padding(1, 1)
            .separator(
                format::LinePosition::Title,
                format::LineSeparator::new('-', '+', '+', '+'),
            )
            .build(),
    );
    table.set_titles(T::columns());
    for row in rows {
        table.add_row(row.to_row());
    }
    if !table.is_empty() {
        table.printstd();
    }
}

/// Imported prefix count for one source AS
pub(super) struct AsCountRow {
    pub asn: u32,
    pub name: String,
    pub prefixes: usize,
}

impl ToRow for AsCountRow {
    fn columns() -> Row {
        row!["ASN", "AS Name", "Prefixes"]
    }

    fn to_row(&self) -> Row {
        row![self.asn, self.name, self.prefixes]
    }
}

impl ToRow for FailedRoute {
    fn columns() -> Row {
        row!["Route", "Error"]
    }

    fn to_row(&self) -> Row {
        row![self.route, self.error]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_count_row() {
        let row = AsCountRow {
            asn: 64500,
            name: "EXAMPLE-AS".to_string(),
            prefixes: 12,
        }
        .to_row();
        assert_eq!(row.len(), AsCountRow::columns().len());
        assert_eq!(row.get_cell(1).unwrap().get_content(), "EXAMPLE-AS");
        assert_eq!(row.get_cell(2).unwrap().get_content(), "12");
    }
}
