use tabled::{
    Table,
    settings::{
        Alignment, Modify, Style,
        format::Format,
        object::{Columns, Rows},
    },
};

/// Emoji mappings for resource states and reasons
pub struct EmojiFormatter;

impl EmojiFormatter {
    pub fn format_value(value: &str) -> String {
        match value.trim() {
            "Valid" => "✅ Valid".to_string(),
            "Warning" => "⚠️ Warning".to_string(),
            "Invalid" => "❌ Invalid".to_string(),
            "true" => "✅".to_string(),
            "false" => "❌".to_string(),
            _ => value.to_string(),
        }
    }

    /// Apply emoji formatting to a table column by index
    pub fn apply_to_column(mut table: Table, column_index: usize) -> Table {
        table.with(
            Modify::new(Columns::new(column_index..=column_index))
                .with(Format::content(Self::format_value)),
        );
        table
    }
}

/// kubectl-like clean style with curved borders and uppercase headers
pub struct TableTheme;

impl TableTheme {
    pub fn apply_default(mut table: Table) -> Table {
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Format::content(|s| s.to_uppercase())))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));
        table
    }

    pub fn apply_with_emoji(table: Table, columns: &[usize]) -> Table {
        columns.iter().fold(Self::apply_default(table), |table, column| {
            EmojiFormatter::apply_to_column(table, *column)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tabled::Tabled;

    #[rstest]
    #[case("Valid", "✅ Valid")]
    #[case("Invalid", "❌ Invalid")]
    #[case("false", "❌")]
    #[case("Rejected", "Rejected")]
    fn test_format_value(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(EmojiFormatter::format_value(value), expected);
    }

    #[derive(Tabled)]
    struct Row {
        name: &'static str,
        state: &'static str,
    }

    #[test]
    fn test_theme_uppercases_headers() {
        let table = TableTheme::apply_with_emoji(
            Table::new([Row {
                name: "cafe",
                state: "Valid",
            }]),
            &[1],
        );
        let rendered = table.to_string();
        assert!(rendered.contains("NAME"));
        assert!(rendered.contains("✅ Valid"));
        assert!(rendered.contains('╭'));
    }
}
