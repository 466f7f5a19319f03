use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use spandsl::Token;

/// Format a token stream as a table with terminal width awareness
pub fn format_tokens(tokens: &[Token]) -> String {
    if tokens.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::DynamicFullWidth);
    table.set_header(vec![
        Cell::new("kind"),
        Cell::new("text"),
        Cell::new("offset"),
        Cell::new("line"),
        Cell::new("column"),
    ]);

    for token in tokens {
        table.add_row(vec![
            Cell::new(format!("{:?}", token.kind)),
            Cell::new(&token.text),
            Cell::new(token.offset),
            Cell::new(token.line),
            Cell::new(token.column),
        ]);
    }

    table.to_string()
}
