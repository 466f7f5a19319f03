use spandsl::{parse, tokenize};
use test_each_file::test_each_file;

/// Strip comments starting with # from the query
fn strip_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

test_each_file! { for ["span"] in "./crates/spandsl/queries" => test_parse_query }

fn test_parse_query([input]: [&str; 1]) {
    // Strip comments
    let query = strip_comments(input);

    let tokens = tokenize(&query);
    assert!(
        tokens.is_ok(),
        "Failed to tokenize query: {}\nQuery: {}",
        tokens.unwrap_err(),
        query
    );

    // Parse the query
    let result = parse(tokens.unwrap());

    // Assert that parsing succeeded
    assert!(
        result.is_ok(),
        "Failed to parse query: {}\nQuery: {}",
        result.unwrap_err(),
        query
    );
    assert!(result.unwrap().has.is_some());
}
