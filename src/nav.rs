//! Tab order and route normalization.

use crate::authz::{self, Module};

/// Routes of the bottom tab bar, left to right.
pub const NAV_ORDER: [&str; 3] = ["/", "/finanzas", "/administracion"];

/// Reduce a path to its first segment: `/finanzas/bitacora?x=1` -> `/finanzas`.
pub fn base_route(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    match path.split('/').find(|segment| !segment.is_empty()) {
        Some(first) => format!("/{}", first),
        None => "/".to_string(),
    }
}

/// Position of `path` in the tab bar, if it belongs to a tab.
pub fn tab_index(path: &str) -> Option<usize> {
    let base = base_route(path);
    NAV_ORDER.iter().position(|route| *route == base)
}

/// Tabs the role set may see, as `(route, label)` in bar order.
pub fn tabs<S: AsRef<str>>(roles: &[S]) -> Vec<(&'static str, &'static str)> {
    [
        (Module::Inicio, "Inicio"),
        (Module::Finanzas, "Finanzas"),
        (Module::Administracion, "Administración"),
    ]
    .into_iter()
    .filter(|(module, _)| authz::can_access_module(roles, *module))
    .map(|(module, label)| (module.route(), label))
    .collect()
}
