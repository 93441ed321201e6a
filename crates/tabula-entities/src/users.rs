//! `USUARIOS` table

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tabula_codec::cell::{format_date, format_flag, parse_date, parse_flag, FlagStyle};
use tabula_codec::{CodecError, Record, SheetRecord};
use tabula_repository::{EntityRepository, RepositoryConfig, StoreScheduler, TabularStore};
use tracing::info;
use uuid::Uuid;

/// Column names of `USUARIOS`
pub mod columns {
    /// Identity
    pub const ID: &str = "id_usuario";
    /// Institutional address, used for sign-in lookups
    pub const INSTITUTIONAL_EMAIL: &str = "correo_usuario";
    /// Given name
    pub const FIRST_NAME: &str = "nombre_usuario";
    /// Family name
    pub const LAST_NAME: &str = "apellido_usuario";
    /// Academic program
    pub const PROGRAM: &str = "programa_academico";
    /// Campus
    pub const CAMPUS: &str = "sede";
    /// Identity document number
    pub const DOCUMENT_NUMBER: &str = "documento_usuario";
    /// Identity document kind
    pub const DOCUMENT_KIND: &str = "tipoDoc";
    /// Phone
    pub const PHONE: &str = "telefono";
    /// Birth date
    pub const BIRTH_DATE: &str = "fecha_nac";
    /// Personal contact address
    pub const CONTACT_EMAIL: &str = "email";
    /// Role
    pub const ROLE: &str = "rol";
    /// Profile not completed yet
    pub const FIRST_LOGIN: &str = "primer_login";
}

/// What a user may do
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Uploads their own documents
    #[default]
    Student,
    /// Reviews everyone's documents
    Admin,
    /// Any other label found in the sheet, kept verbatim
    Other(String),
}

impl Role {
    /// Parse the `rol` cell; empty means student
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "" | "estudiante" => Self::Student,
            "admin" | "administrador" => Self::Admin,
            _ => Self::Other(text.trim().to_string()),
        }
    }

    /// Label written to the sheet
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Student => "estudiante",
            Self::Admin => "admin",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person tracked by the system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// `id_usuario`
    pub id: String,
    /// `correo_usuario`
    pub institutional_email: String,
    /// `nombre_usuario`
    pub first_name: String,
    /// `apellido_usuario`
    pub last_name: String,
    /// `programa_academico`
    pub program: String,
    /// `sede`
    pub campus: String,
    /// `documento_usuario`
    pub document_number: String,
    /// `tipoDoc`
    pub document_kind: String,
    /// `telefono`
    pub phone: String,
    /// `fecha_nac`
    pub birth_date: Option<NaiveDate>,
    /// `email`
    pub contact_email: String,
    /// `rol`
    pub role: Role,
    /// `primer_login`
    pub first_login: bool,
}

impl User {
    /// New student with a generated id
    ///
    /// `display_name` is split at the first space into first and last name.
    #[must_use]
    pub fn new_student(email: impl Into<String>, display_name: &str) -> Self {
        let display_name = display_name.trim();
        let (first_name, last_name) = display_name
            .split_once(char::is_whitespace)
            .map_or((display_name, ""), |(first, rest)| (first, rest.trim()));
        Self {
            id: Uuid::new_v4().to_string(),
            institutional_email: email.into(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role: Role::Student,
            first_login: true,
            ..Self::default()
        }
    }

    /// `first last`, trimmed
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Address notifications go to: the institutional one, else the contact one
    #[must_use]
    pub fn notification_email(&self) -> Option<&str> {
        [&self.institutional_email, &self.contact_email]
            .into_iter()
            .map(|email| email.trim())
            .find(|email| !email.is_empty())
    }
}

impl SheetRecord for User {
    const TABLE: &'static str = "USUARIOS";
    const FIELDS: &'static [&'static str] = &[
        columns::ID,
        columns::INSTITUTIONAL_EMAIL,
        columns::FIRST_NAME,
        columns::LAST_NAME,
        columns::PROGRAM,
        columns::CAMPUS,
        columns::DOCUMENT_NUMBER,
        columns::DOCUMENT_KIND,
        columns::PHONE,
        columns::BIRTH_DATE,
        columns::CONTACT_EMAIL,
        columns::ROLE,
        columns::FIRST_LOGIN,
    ];
    const ID_FIELD: &'static str = columns::ID;

    fn id(&self) -> &str {
        &self.id
    }

    fn to_record(&self) -> Record {
        Record::with_capacity(Self::FIELDS.len())
            .with(columns::ID, &self.id)
            .with(columns::INSTITUTIONAL_EMAIL, &self.institutional_email)
            .with(columns::FIRST_NAME, &self.first_name)
            .with(columns::LAST_NAME, &self.last_name)
            .with(columns::PROGRAM, &self.program)
            .with(columns::CAMPUS, &self.campus)
            .with(columns::DOCUMENT_NUMBER, &self.document_number)
            .with(columns::DOCUMENT_KIND, &self.document_kind)
            .with(columns::PHONE, &self.phone)
            .with(columns::BIRTH_DATE, format_date(self.birth_date))
            .with(columns::CONTACT_EMAIL, &self.contact_email)
            .with(columns::ROLE, self.role.as_str())
            .with(columns::FIRST_LOGIN, format_flag(self.first_login, FlagStyle::YesNo))
    }

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            id: record.require(columns::ID)?.to_string(),
            institutional_email: record.text(columns::INSTITUTIONAL_EMAIL).to_string(),
            first_name: record.text(columns::FIRST_NAME).to_string(),
            last_name: record.text(columns::LAST_NAME).to_string(),
            program: record.text(columns::PROGRAM).to_string(),
            campus: record.text(columns::CAMPUS).to_string(),
            document_number: record.text(columns::DOCUMENT_NUMBER).to_string(),
            document_kind: record.text(columns::DOCUMENT_KIND).to_string(),
            phone: record.text(columns::PHONE).to_string(),
            birth_date: parse_date(columns::BIRTH_DATE, record.text(columns::BIRTH_DATE))?,
            contact_email: record.text(columns::CONTACT_EMAIL).to_string(),
            role: Role::parse(record.text(columns::ROLE)),
            first_login: parse_flag(columns::FIRST_LOGIN, record.text(columns::FIRST_LOGIN))?,
        })
    }
}

/// Repository over `USUARIOS`
#[derive(Debug, Clone)]
pub struct UsersRepository {
    inner: EntityRepository<User>,
}

impl UsersRepository {
    /// Create the repository
    ///
    /// # Errors
    /// `SchemaMismatch` if the table layout is invalid.
    pub fn new(
        store: Arc<dyn TabularStore>,
        scheduler: StoreScheduler,
        config: RepositoryConfig,
    ) -> tabula_repository::Result<Self> {
        Ok(Self {
            inner: EntityRepository::new(store, scheduler, config)?,
        })
    }

    /// Typed repository underneath
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityRepository<User> {
        &self.inner
    }

    /// Every user
    ///
    /// # Errors
    /// Store failures.
    pub async fn get_all(&self) -> tabula_repository::Result<Vec<User>> {
        self.inner.get_all().await
    }

    /// User with institutional address `email`
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_email(&self, email: &str) -> tabula_repository::Result<Option<User>> {
        self.inner
            .find_one_by(columns::INSTITUTIONAL_EMAIL, email)
            .await
    }

    /// User with id `id`
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_by_id(&self, id: &str) -> tabula_repository::Result<Option<User>> {
        self.inner.find_by_id(id).await
    }

    /// Append `user`; the id must already be set
    ///
    /// # Errors
    /// `SchemaMismatch` when `user.id` is empty, `CreateFailed`, store failures.
    pub async fn create(&self, user: &User) -> tabula_repository::Result<User> {
        if user.id.trim().is_empty() {
            return Err(CodecError::MissingField(columns::ID.to_string()).into());
        }
        self.inner.create(user).await
    }

    /// Overwrite the stored row of `user`
    ///
    /// # Errors
    /// Store failures.
    pub async fn update(&self, user: &User) -> tabula_repository::Result<Option<User>> {
        self.inner.replace(user).await
    }

    /// Existing user for `email`, or a new student created from `display_name`
    ///
    /// Returns the user and whether it was created.
    ///
    /// # Errors
    /// Store failures.
    pub async fn find_or_create(
        &self,
        email: &str,
        display_name: &str,
    ) -> tabula_repository::Result<(User, bool)> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok((user, false));
        }
        let user = User::new_student(email, display_name);
        let created = self.inner.create(&user).await?;
        info!(user_id = %created.id, "registered new user");
        Ok((created, true))
    }
}
