/*!
School reference records.
*/
use std::io::Read;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct School {
    /// Short unique key, always lower case.
    pub abbr: String,
    pub name: String,
    pub address: String,
}

/**
Derive the school lookup key from a combined `"ABBR: Full Name"` display
string: everything before the first colon, lower-cased.

The prefix isn't trimmed, so `"ABC : X"` looks up `"abc "` and finds
nothing. A name with no colon at all is taken to be just the abbreviation.
Returns `None` if the prefix is blank.
*/
pub fn abbr_from_schoolname(schoolname: &str) -> Option<String> {
    let prefix = match schoolname.split_once(':') {
        Some((prefix, _)) => prefix,
        None => schoolname,
    };

    if prefix.trim().is_empty() {
        None
    } else {
        Some(prefix.to_lowercase())
    }
}

impl School {
    /// The string a signup form should offer for this school.
    pub fn display_name(&self) -> String {
        format!("{}: {}", self.abbr.to_uppercase(), &self.name)
    }

    /**
    School .csv rows should look like this

    ```csv
    #abbr,name,address
    lhs,Lincoln High,"100 Main St, Springfield"
    ```
    */
    pub fn from_csv_line(
        row: &csv::StringRecord
    ) -> Result<School, &'static str> {
        log::trace!("School::from_csv_line( {:?} ) called.", row);

        let abbr = match row.get(0) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => { return Err("no abbreviation"); },
        };
        let name = match row.get(1) {
            Some(s) => s.to_owned(),
            None => { return Err("no school name"); },
        };
        let address = match row.get(2) {
            Some(s) => s.to_owned(),
            None => { return Err("no address"); },
        };

        Ok(School { abbr, name, address })
    }

    pub fn vec_from_csv_reader<R: Read>(r: R) -> Result<Vec<School>, String> {
        log::trace!("School::vec_from_csv_reader(...) called.");

        let mut csv_reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .flexible(false)
            .has_headers(false)
            .from_reader(r);

        let mut schools: Vec<School> = Vec::new();

        for (n, res) in csv_reader.records().enumerate() {
            let record = res.map_err(|e| match e.position() {
                Some(p) => format!("Error on line {}: {}", p.line(), &e),
                None => format!("Error in CSV record {}: {}", &n, &e),
            })?;

            match School::from_csv_line(&record) {
                Ok(school) => { schools.push(school); },
                Err(e) => {
                    let estr = match record.position() {
                        Some(p) => format!("Error on line {}: {}", p.line(), &e),
                        None => format!("Error in CSV record {}: {}", &n, &e),
                    };
                    return Err(estr);
                },
            }
        }

        log::trace!(
            "School::vec_from_csv_reader() returns {} Schools.",
            schools.len()
        );
        Ok(schools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    #[test]
    fn abbr_is_prefix_lowercased() {
        assert_eq!(Some("abc".to_owned()), abbr_from_schoolname("ABC: Lincoln High"));
        assert_eq!(Some("abc".to_owned()), abbr_from_schoolname("abc: Lincoln High"));
        assert_eq!(Some("abc".to_owned()), abbr_from_schoolname("aBc:Lincoln: High"));
    }

    #[test]
    fn abbr_without_colon() {
        assert_eq!(Some("lhs".to_owned()), abbr_from_schoolname("LHS"));
        assert_eq!(None, abbr_from_schoolname(": Nowhere"));
        assert_eq!(None, abbr_from_schoolname("   "));
    }

    #[test]
    fn abbr_keeps_surrounding_space() {
        assert_eq!(Some("abc ".to_owned()), abbr_from_schoolname("ABC : Lincoln High"));
        assert_eq!(Some(" lhs ".to_owned()), abbr_from_schoolname(" LHS "));
    }

    #[test]
    fn schools_from_csv() {
        ensure_logging();
        let f = std::fs::File::open("test/schools.csv").unwrap();
        let schools = School::vec_from_csv_reader(f).unwrap();
        log::trace!("Schools:\n{:#?}", &schools);
        assert_eq!(3, schools.len());
        assert_eq!("lhs", schools[0].abbr);
        assert_eq!("100 Main St, Springfield", schools[0].address);
        assert_eq!("LHS: Lincoln High", schools[0].display_name());
    }

    #[test]
    fn bad_csv_row_names_line() {
        let data = "lhs, Lincoln High, 100 Main St\n, Nameless, Nowhere\n";
        let e = School::vec_from_csv_reader(data.as_bytes()).unwrap_err();
        assert!(e.contains("line 2"), "{}", &e);
    }
}
