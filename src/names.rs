//! Splitting an identity-provider "full name" claim into `nombre` / `apellido`.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonName {
    pub nombre: String,
    pub apellido: String,
}

/// Positional rules over whitespace tokens:
///
/// | tokens | nombre        | apellido      |
/// |--------|---------------|---------------|
/// | 0      | ""            | ""            |
/// | 1      | t1            | ""            |
/// | 2      | t1            | t2            |
/// | 3      | t1            | t3            |
/// | 4      | t1 t2         | t3 t4         |
/// | 5+     | t1 t2         | t3            |
pub fn split_full_name(full_name: &str) -> PersonName {
    let tokens: Vec<&str> = full_name.split_whitespace().collect();
    let (nombre, apellido) = match tokens.as_slice() {
        [] => (String::new(), String::new()),
        [first] => (first.to_string(), String::new()),
        [first, last] => (first.to_string(), last.to_string()),
        [first, _, third] => (first.to_string(), third.to_string()),
        [a, b, c, d] => (format!("{} {}", a, b), format!("{} {}", c, d)),
        [a, b, c, ..] => (format!("{} {}", a, b), c.to_string()),
    };
    PersonName { nombre, apellido }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(s: &str) -> (String, String) {
        let n = split_full_name(s);
        (n.nombre, n.apellido)
    }

    #[test]
    fn empty_and_blank_names() {
        assert_eq!(split(""), (String::new(), String::new()));
        assert_eq!(split("   \t "), (String::new(), String::new()));
    }

    #[test]
    fn follows_positional_rules() {
        assert_eq!(split("Ana"), ("Ana".into(), "".into()));
        assert_eq!(split("Ana Pérez"), ("Ana".into(), "Pérez".into()));
        assert_eq!(split("Ana María Pérez"), ("Ana".into(), "Pérez".into()));
        assert_eq!(
            split("Ana María Pérez Rojas"),
            ("Ana María".into(), "Pérez Rojas".into())
        );
        assert_eq!(
            split("Ana María Pérez Rojas Vaca"),
            ("Ana María".into(), "Pérez".into())
        );
        assert_eq!(
            split("Ana María Pérez Rojas Vaca de la Fuente"),
            ("Ana María".into(), "Pérez".into())
        );
    }

    #[test]
    fn collapses_extra_whitespace() {
        assert_eq!(split("  Luis   Rojas  "), ("Luis".into(), "Rojas".into()));
    }
}
