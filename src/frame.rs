/// A parsed csv table.  Every cell is text; `None` is the single "no value"
/// marker so that key lookups never conflate an unset cell with `""` or `0`,
/// and so that missing values reach the database as true NULLs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Frame {
        Frame {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Keep only the columns named in `keep`, in their source order.  Used to
    /// drop source columns absent from the destination schema, e.g.
    /// `created_on`, `updated_on`, `source`.
    pub fn retain_columns(&mut self, keep: &[&str]) {
        let idx: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| keep.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.columns = idx.iter().map(|&i| self.columns[i].clone()).collect();
        for row in self.rows.iter_mut() {
            let mut kept = Vec::with_capacity(idx.len());
            for &i in &idx {
                kept.push(row[i].take());
            }
            *row = kept;
        }
    }

    /// Stable sort of the rows by the numeric value of one column, missing
    /// values last.  Needed for `nace_code` where parents must be inserted
    /// before their children.
    pub fn sort_by_numeric(&mut self, column: &str) {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        self.rows.sort_by(|a, b| {
            let x = a[idx].as_deref().and_then(|v| v.parse::<f64>().ok());
            let y = b[idx].as_deref().and_then(|v| v.parse::<f64>().ok());
            match (x, y) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame {
            columns: vec!["id".to_string(), "level".to_string(), "created_on".to_string()],
            rows: vec![
                vec![Some("B".to_string()), Some("2".to_string()), Some("x".to_string())],
                vec![Some("A".to_string()), Some("1".to_string()), None],
                vec![Some("C".to_string()), None, None],
            ],
        }
    }

    #[test]
    fn retain_columns_drops_extras() {
        let mut f = frame();
        f.retain_columns(&["id", "level"]);
        assert_eq!(f.columns, vec!["id", "level"]);
        assert_eq!(f.rows[0], vec![Some("B".to_string()), Some("2".to_string())]);
    }

    #[test]
    fn sort_by_numeric_missing_last() {
        let mut f = frame();
        f.sort_by_numeric("level");
        let ids: Vec<_> = f.rows.iter().map(|r| r[0].clone().unwrap()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }
}
