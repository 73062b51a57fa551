//! Declarations read from a Brian equation block.
//!
//! The compiler never validates equations (the engine does that when the
//! script runs). It only needs to know which variables a block declares and
//! in which unit, so StateMonitor plots can divide by a sensible display
//! unit.

/// Form of a declaration line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `dv/dt = expr : unit`
    Differential,
    /// `I = expr : unit`
    Subexpression,
    /// `tau : second`
    Parameter,
}

/// One declared variable and its unit text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub variable: String,
    pub kind: DeclarationKind,
    /// Unit as written after the colon, flags removed (e.g. `volt`, `1`)
    pub unit: String,
}

/// Every declaration found in an equation block, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquationBlock {
    pub declarations: Vec<Declaration>,
}

impl EquationBlock {
    /// Unit text declared for `variable`
    pub fn unit_of(&self, variable: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|decl| decl.variable == variable)
            .map(|decl| decl.unit.as_str())
    }
}

/// Read the declarations of a Brian-style equation block.
///
/// Lines that do not follow the `lhs : unit` shape are skipped.
pub fn parse_equations(text: &str) -> EquationBlock {
    let declarations = text.lines().filter_map(parse_line).collect();
    EquationBlock { declarations }
}

fn parse_line(line: &str) -> Option<Declaration> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return None;
    }

    let (body, unit_part) = line.rsplit_once(':')?;
    // Flags follow the unit: `volt (unless refractory)`
    let unit = unit_part.split('(').next().unwrap_or("").trim();
    if unit.is_empty() {
        return None;
    }

    let (kind, variable) = match body.split_once('=') {
        Some((lhs, _)) => {
            let lhs = lhs.trim();
            match lhs.strip_prefix('d').and_then(|rest| rest.strip_suffix("/dt")) {
                Some(var) => (DeclarationKind::Differential, var.trim()),
                None => (DeclarationKind::Subexpression, lhs),
            }
        }
        None => (DeclarationKind::Parameter, body.trim()),
    };

    if !crate::registry::is_identifier(variable) {
        return None;
    }

    Some(Declaration {
        variable: variable.to_string(),
        kind,
        unit: unit.to_string(),
    })
}
