use once_cell::sync::Lazy;
use regex::Regex;

static SIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(bytes|[kmgtpe]i?b?)\b").expect("size pattern is valid")
});

/// Extracts the first human readable size (`1024 MB`, `1.5GB`, `8192 bytes`,
/// `1.1G`) from command output, normalised to `<number> <unit>`.
pub fn parse_database_size(output: &str) -> Option<String> {
    let captures = SIZE_PATTERN.captures(output)?;
    Some(format!("{} {}", &captures[1], &captures[2]))
}

#[cfg(test)]
mod tests {
    use super::parse_database_size;
    use test_case::test_case;

    #[test_case(" pg_size_pretty \n----------------\n 1024 MB\n(1 row)\n", Some("1024 MB"); "psql table")]
    #[test_case("1.5GB", Some("1.5 GB"); "no space")]
    #[test_case(" 8192 bytes\n", Some("8192 bytes"); "bytes")]
    #[test_case("23 kB", Some("23 kB"); "lowercase k")]
    #[test_case("1.1G\t/var/lib/postgresql/16/test\n", Some("1.1 G"); "du style")]
    #[test_case("2 GiB", Some("2 GiB"); "binary unit")]
    #[test_case("ERROR:  database \"postgres\" does not exist\n", None; "error text")]
    #[test_case("(1 row)\n", None; "no size")]
    #[test_case("", None; "empty")]
    fn parses_sizes(output: &str, expected: Option<&str>) {
        assert_eq!(parse_database_size(output).as_deref(), expected);
    }
}
