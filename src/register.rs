/*!
Student self-registration.
*/
use thiserror::Error;

use crate::{
    auth,
    school::abbr_from_schoolname,
    store::{AccountStore, DbError, Insertion},
    user::{Role, SignupProblem, StudentSignup, User},
};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Malformed field {0}")]
    Malformed(String),

    #[error("User already exists")]
    AlreadyExists,

    #[error("School does not exist")]
    NoSuchSchool(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SignupProblem> for RegistrationError {
    fn from(p: SignupProblem) -> Self {
        match p {
            SignupProblem::Missing(fields) => RegistrationError::MissingFields(fields),
            SignupProblem::Malformed(s) => RegistrationError::Malformed(s),
        }
    }
}

impl From<DbError> for RegistrationError {
    fn from(e: DbError) -> Self {
        RegistrationError::Internal(e.to_string())
    }
}

/**
Validate `signup` and, if everything checks out, insert a new student.

Order of checks: required fields, existing email, school existence. The
new record always gets `Role::Student` and an unverified email. Returns the
inserted record.
*/
pub async fn register_student(
    store: &dyn AccountStore,
    signup: &StudentSignup,
    bcrypt_cost: u32,
) -> Result<User, RegistrationError> {
    log::trace!("register_student( {:?} ) called.", &signup.email);

    let ns = signup.validate()?;

    if store.get_user_by_email(&ns.email).await?.is_some() {
        return Err(RegistrationError::AlreadyExists);
    }

    let school_abbr = abbr_from_schoolname(&ns.schoolname)
        .ok_or_else(|| RegistrationError::Malformed(format!(
            "schoolname: {:?} has no school abbreviation", &ns.schoolname
        )))?;
    log::debug!("school_abbr {:?}", &school_abbr);

    if store.get_school(&school_abbr).await?.is_none() {
        return Err(RegistrationError::NoSuchSchool(school_abbr));
    }

    let password = auth::hash_password(&ns.password, bcrypt_cost).await
        .map_err(RegistrationError::Internal)?;

    let user = User {
        firstname: ns.firstname,
        lastname: ns.lastname,
        age: ns.age,
        grade: ns.grade,
        email: ns.email,
        schoolname: ns.schoolname,
        school_abbr,
        password,
        role: Role::Student,
        email_verified: false,
    };

    match store.insert_user(&user).await? {
        Insertion::Inserted => {
            log::info!("Registered student {:?}.", &user.email);
            Ok(user)
        },
        Insertion::Duplicate => Err(RegistrationError::AlreadyExists),
    }
}
