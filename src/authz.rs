//! Role-based module gating.
//!
//! Presentation-level only: it decides which screens and tabs to offer. The
//! backend enforces authorization on every request regardless.

use std::fmt;
use std::str::FromStr;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SOCIO: &str = "socio";
pub const ROLE_ENFERMERO: &str = "enfermero";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Inicio,
    Finanzas,
    Administracion,
    Perfil,
}

impl Module {
    pub const ALL: [Module; 4] = [
        Module::Inicio,
        Module::Finanzas,
        Module::Administracion,
        Module::Perfil,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Inicio => "inicio",
            Module::Finanzas => "finanzas",
            Module::Administracion => "administracion",
            Module::Perfil => "perfil",
        }
    }

    /// Roles allowed into this module.
    pub fn allowed_roles(&self) -> &'static [&'static str] {
        match self {
            Module::Inicio | Module::Finanzas => &[ROLE_ADMIN, ROLE_SOCIO],
            Module::Administracion => &[ROLE_ADMIN],
            Module::Perfil => &[ROLE_ADMIN, ROLE_SOCIO, ROLE_ENFERMERO],
        }
    }

    /// Route the module lives under.
    pub fn route(&self) -> &'static str {
        match self {
            Module::Inicio => "/",
            Module::Finanzas => "/finanzas",
            Module::Administracion => "/administracion",
            Module::Perfil => "/perfil",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown module: {0}")]
pub struct UnknownModule(pub String);

impl FromStr for Module {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Module::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownModule(s.to_string()))
    }
}

/// True iff `roles` intersects the module's allowed list.
pub fn can_access_module<S: AsRef<str>>(roles: &[S], module: Module) -> bool {
    has_any_role(roles, module.allowed_roles())
}

/// True iff at least one of `roles` is in `required`. Empty role sets never match.
pub fn has_any_role<S: AsRef<str>, R: AsRef<str>>(roles: &[S], required: &[R]) -> bool {
    roles
        .iter()
        .any(|role| required.iter().any(|r| r.as_ref() == role.as_ref()))
}

pub fn is_admin<S: AsRef<str>>(roles: &[S]) -> bool {
    roles.iter().any(|r| r.as_ref() == ROLE_ADMIN)
}

/// Modules the role set may open, in display order.
pub fn accessible_modules<S: AsRef<str>>(roles: &[S]) -> Vec<Module> {
    Module::ALL
        .into_iter()
        .filter(|m| can_access_module(roles, *m))
        .collect()
}

/// A role set bound for repeated checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGate {
    roles: Vec<String>,
}

impl RoleGate {
    pub fn new(roles: Vec<String>) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn can_access(&self, module: Module) -> bool {
        can_access_module(&self.roles, module)
    }

    pub fn has_role(&self, required: &[&str]) -> bool {
        has_any_role(&self.roles, required)
    }

    pub fn is_admin(&self) -> bool {
        is_admin(&self.roles)
    }

    pub fn modules(&self) -> Vec<Module> {
        accessible_modules(&self.roles)
    }
}
