/*!
Database users and the signup payload that creates them.
*/
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Educator,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Student  => "student",
            Role::Educator => "educator",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student"  => Ok(Role::Student),
            "educator" => Ok(Role::Educator),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

/// A stored user record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub firstname: String,
    pub lastname: String,
    pub age: i32,
    pub grade: i32,
    /// Unique across all users.
    pub email: String,
    /// The combined `"abbr: name"` display string the user picked.
    pub schoolname: String,
    pub school_abbr: String,
    /// bcrypt hash; never the plaintext.
    pub password: String,
    pub role: Role,
    pub email_verified: bool,
}

/// Either a JSON number or a numeric string.
///
/// Signup forms get posted as `FormData` turned into JSON, so every field
/// arrives as a string; API clients send real numbers.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Numberish {
    Number(serde_json::Number),
    Text(String),
}

impl Numberish {
    /// `Ok(None)` for the "falsy" values that count as a missing field: a
    /// numeric zero or a blank string. The string `"0"` is present.
    fn to_i32(&self) -> Result<Option<i32>, String> {
        let n: i64 = match self {
            Numberish::Number(n) => match n.as_i64() {
                Some(0) => { return Ok(None); },
                Some(n) => n,
                None => match n.as_f64() {
                    Some(x) if x == 0.0 => { return Ok(None); },
                    Some(x) if x.fract() == 0.0 => x as i64,
                    _ => { return Err(format!("{} is not a whole number", n)); },
                },
            },
            Numberish::Text(s) => match s.trim() {
                "" => { return Ok(None); },
                s => s.parse().map_err(|_| format!("{:?} is not a whole number", s))?,
            },
        };

        i32::try_from(n)
            .map(Some)
            .map_err(|_| format!("{} is out of range", n))
    }
}

/// Signup payload exactly as it comes off the wire. Every field is optional
/// here; `validate()` decides what's actually missing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StudentSignup {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub age: Option<Numberish>,
    pub grade: Option<Numberish>,
    pub email: Option<String>,
    pub schoolname: Option<String>,
    pub password: Option<String>,
}

/// A signup payload that has passed boundary validation.
#[derive(Clone, Debug, PartialEq)]
pub struct NewStudent {
    pub firstname: String,
    pub lastname: String,
    pub age: i32,
    pub grade: i32,
    pub email: String,
    pub schoolname: String,
    pub password: String,
}

#[derive(Debug, PartialEq)]
pub enum SignupProblem {
    Missing(Vec<&'static str>),
    Malformed(String),
}

fn present(field: &Option<String>) -> Option<&str> {
    match field.as_deref() {
        Some(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

impl StudentSignup {
    pub fn validate(&self) -> Result<NewStudent, SignupProblem> {
        log::trace!("StudentSignup::validate() called.");

        let mut missing: Vec<&'static str> = Vec::new();

        let firstname = present(&self.firstname);
        if firstname.is_none() { missing.push("firstname"); }
        let lastname = present(&self.lastname);
        if lastname.is_none() { missing.push("lastname"); }
        let email = present(&self.email);
        if email.is_none() { missing.push("email"); }
        let password = present(&self.password);
        if password.is_none() { missing.push("password"); }

        let age = match &self.age {
            Some(n) => n.to_i32()
                .map_err(|e| SignupProblem::Malformed(format!("age: {}", &e)))?,
            None => None,
        };
        if age.is_none() { missing.push("age"); }
        let grade = match &self.grade {
            Some(n) => n.to_i32()
                .map_err(|e| SignupProblem::Malformed(format!("grade: {}", &e)))?,
            None => None,
        };
        if grade.is_none() { missing.push("grade"); }

        let schoolname = present(&self.schoolname);
        if schoolname.is_none() { missing.push("schoolname"); }

        match (firstname, lastname, age, grade, email, schoolname, password) {
            (
                Some(firstname), Some(lastname), Some(age), Some(grade),
                Some(email), Some(schoolname), Some(password),
            ) => Ok(NewStudent {
                firstname: firstname.to_owned(),
                lastname: lastname.to_owned(),
                age,
                grade,
                email: email.to_owned(),
                schoolname: schoolname.to_owned(),
                password: password.to_owned(),
            }),
            _ => Err(SignupProblem::Missing(missing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    fn full_signup() -> StudentSignup {
        serde_json::from_str(r#"{
            "firstname": "Ada",
            "lastname": "Lovelace",
            "age": "15",
            "grade": 10,
            "email": "ada@example.org",
            "schoolname": "LHS: Lincoln High",
            "password": "analytical"
        }"#).unwrap()
    }

    #[test]
    fn role_tokens() {
        assert_eq!("student", Role::Student.to_string());
        assert_eq!(Ok(Role::Educator), "educator".parse::<Role>());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn complete_signup_validates() {
        ensure_logging();
        let ns = full_signup().validate().unwrap();
        assert_eq!(15, ns.age);
        assert_eq!(10, ns.grade);
        assert_eq!("LHS: Lincoln High", ns.schoolname);
    }

    #[test]
    fn each_missing_field_is_reported() {
        ensure_logging();
        let blankers: &[(&str, fn(&mut StudentSignup))] = &[
            ("firstname", |s| s.firstname = None),
            ("lastname", |s| s.lastname = Some(String::new())),
            ("age", |s| s.age = None),
            ("grade", |s| s.grade = Some(Numberish::Text(" ".to_owned()))),
            ("email", |s| s.email = None),
            ("schoolname", |s| s.schoolname = None),
            ("password", |s| s.password = Some(String::new())),
        ];

        for (field, blank) in blankers.iter() {
            let mut s = full_signup();
            blank(&mut s);
            assert_eq!(
                Err(SignupProblem::Missing(vec![*field])),
                s.validate()
            );
        }
    }

    #[test]
    fn zero_age_counts_as_missing() {
        let mut s = full_signup();
        s.age = Some(Numberish::Number(0.into()));
        assert_eq!(Err(SignupProblem::Missing(vec!["age"])), s.validate());
    }

    #[test]
    fn zero_as_text_is_present() {
        let mut s = full_signup();
        s.age = Some(Numberish::Text("0".to_owned()));
        assert_eq!(0, s.validate().unwrap().age);

        let s: StudentSignup = serde_json::from_str(r#"{
            "firstname": "Ada", "lastname": "Lovelace", "age": 0, "grade": "0",
            "email": "ada@example.org", "schoolname": "LHS: Lincoln High",
            "password": "analytical"
        }"#).unwrap();
        assert_eq!(Err(SignupProblem::Missing(vec!["age"])), s.validate());
    }

    #[test]
    fn non_numeric_grade_is_malformed() {
        let mut s = full_signup();
        s.grade = Some(Numberish::Text("tenth".to_owned()));
        assert!(matches!(s.validate(), Err(SignupProblem::Malformed(_))));
    }
}
