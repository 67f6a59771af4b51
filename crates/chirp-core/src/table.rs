//! Minimal CSV reading for label and taxonomy sources
//!
//! The label sources are plain comma-separated tables with a header row.
//! Fields may be double-quoted (embedded commas, doubled quotes). This covers
//! everything the observed data uses without pulling in a full CSV stack.

/// A parsed CSV table: header columns plus rows of equal-or-shorter length.
#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse CSV text. Returns `None` when there is no header row.
    pub fn parse(text: &str) -> Option<Self> {
        let mut records = parse_records(text);
        if records.is_empty() {
            return None;
        }
        let columns = records.remove(0);
        Some(Self { columns, rows: records })
    }

    /// Index of a named column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of a named column, in row order, missing cells skipped
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .filter_map(|row| row.get(idx).map(String::as_str))
                .collect(),
        )
    }
}

/// Split CSV text into records of fields, honoring quoted fields
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                // Skip blank lines
                if record.len() > 1 || !record[0].is_empty() {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    // Final record without trailing newline
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let table = Table::parse("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["4", "5", "6"]);
    }

    #[test]
    fn test_parse_quoted_fields() {
        let table = Table::parse("label,common_name\nabc,\"Smith's Finch, Eastern\"\n").unwrap();
        assert_eq!(table.rows[0][1], "Smith's Finch, Eastern");
    }

    #[test]
    fn test_parse_escaped_quotes() {
        let table = Table::parse("a\n\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(table.rows[0][0], "say \"hi\"");
    }

    #[test]
    fn test_parse_crlf_and_blank_lines() {
        let table = Table::parse("a,b\r\n1,2\r\n\r\n3,4\r\n").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["3", "4"]);
    }

    #[test]
    fn test_column_values() {
        let table = Table::parse("x,primary_label\n0,abc\n1,def\n").unwrap();
        assert_eq!(table.column_values("primary_label").unwrap(), vec!["abc", "def"]);
        assert!(table.column_values("missing").is_none());
    }

    #[test]
    fn test_empty_input() {
        assert!(Table::parse("").is_none());
    }
}
