//! Output component declarations.
//!
//! Each element exposes a finite set of named, readable output buffers and
//! designates exactly one of them as the default used when a consumer does
//! not name a component explicitly.

/// Per-element table of declared output components.
///
/// Constructed as a `static` per element variant. The default must be one of
/// the declared names.
#[derive(Debug, Clone, Copy)]
pub struct ComponentTable {
    names: &'static [&'static str],
    default: &'static str,
}

impl ComponentTable {
    pub const fn new(names: &'static [&'static str], default: &'static str) -> Self {
        Self { names, default }
    }

    /// Resolve a consumer's request to a declared component name.
    ///
    /// `None` resolves to the default component; an undeclared name resolves
    /// to `None` and the caller reports `UnknownComponent`.
    pub fn resolve<'a>(&self, requested: Option<&'a str>) -> Option<&'a str> {
        match requested {
            None => Some(self.default),
            Some(name) if self.contains(name) => Some(name),
            Some(_) => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name)
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn default_component(&self) -> &'static str {
        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TABLE: ComponentTable = ComponentTable::new(&["activation", "output"], "activation");

    #[test]
    fn resolves_default() {
        assert_eq!(TABLE.resolve(None), Some("activation"));
    }

    #[test]
    fn resolves_declared_names() {
        assert_eq!(TABLE.resolve(Some("output")), Some("output"));
        assert_eq!(TABLE.resolve(Some("kernel")), None);
    }
}
