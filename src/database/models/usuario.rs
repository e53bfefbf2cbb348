use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Platform role stored in the `rol` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Rol {
    #[default]
    Estudiante,
    Profesor,
    Director,
}

impl Rol {
    pub fn all() -> [Rol; 3] {
        [Rol::Estudiante, Rol::Profesor, Rol::Director]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rol::Estudiante => "Estudiante",
            Rol::Profesor => "Profesor",
            Rol::Director => "Director",
        }
    }
}

impl fmt::Display for Rol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rol::all()
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid role '{}'. Allowed: Estudiante, Profesor, Director", s))
    }
}

/// Stored values are read leniently: missing, null or unrecognised → `Estudiante`
impl<'de> Deserialize<'de> for Rol {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
    }
}

/// Row of `<prefix>_usuarios`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Usuario {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nombre: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub apellido: String,
    pub email: String,
    #[serde(default)]
    pub rol: Rol,
}

impl Usuario {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.nombre, self.apellido).trim().to_string()
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Insert payload for a first-seen user
#[derive(Debug, Clone, Serialize)]
pub struct NewUsuario {
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub rol: Rol,
}
