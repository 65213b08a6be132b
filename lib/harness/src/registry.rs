use crate::case::{BenchmarkCase, CaseContext, CaseId, FnCase, Outcome};
use crate::error::RegistryError;

/// A [BenchmarkCase] together with its identity.
pub struct RegisteredCase<R> {
    id: CaseId,
    case: Box<dyn BenchmarkCase<R>>,
}

impl<R> RegisteredCase<R> {
    /// Returns the identity of the case.
    pub fn id(&self) -> &CaseId {
        &self.id
    }

    /// Returns the category of the case.
    pub fn category(&self) -> &str {
        self.id.category()
    }

    /// Returns the name of the case.
    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// Returns the case itself.
    pub fn case(&self) -> &dyn BenchmarkCase<R> {
        self.case.as_ref()
    }
}

/// A named group of cases.
struct Category<R> {
    name: String,
    cases: Vec<RegisteredCase<R>>,
}

/// The ordered catalog of benchmark cases.
///
/// Categories are kept in the order of their first registration and cases in the order of
/// their registration within the category. This order is the order of the report.
pub struct BenchmarkRegistry<R> {
    categories: Vec<Category<R>>,
}

impl<R> BenchmarkRegistry<R> {
    /// Creates a new empty [BenchmarkRegistry].
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    /// Registers `case` as `category::name`.
    pub fn register(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        case: impl BenchmarkCase<R> + 'static,
    ) -> Result<(), RegistryError> {
        let category = category.into();
        let name = name.into();
        if category.is_empty() || name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let index = match self.categories.iter().position(|c| c.name == category) {
            Some(index) => index,
            None => {
                self.categories.push(Category {
                    name: category.clone(),
                    cases: Vec::new(),
                });
                self.categories.len() - 1
            }
        };

        let cases = &mut self.categories[index].cases;
        if cases.iter().any(|c| c.name() == name) {
            return Err(RegistryError::DuplicateName { category, name });
        }

        cases.push(RegisteredCase {
            id: CaseId::new(category, name),
            case: Box::new(case),
        });
        Ok(())
    }

    /// Registers a closure as `category::name`.
    pub fn register_fn<F>(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        case: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut CaseContext<'_, R>) -> anyhow::Result<Outcome> + 'static,
    {
        self.register(category, name, FnCase(case))
    }

    /// Returns all cases in registration order.
    ///
    /// Every call starts a new iteration from the first case.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCase<R>> {
        self.categories.iter().flat_map(|c| c.cases.iter())
    }

    /// Returns the category names in registration order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Returns the number of registered cases.
    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.cases.len()).sum()
    }

    /// Returns whether no case has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R> Default for BenchmarkRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut CaseContext<'_, ()>) -> anyhow::Result<Outcome> {
        Ok(Outcome::Completed(0))
    }

    fn names(registry: &BenchmarkRegistry<()>) -> Vec<String> {
        registry.iter().map(|c| c.id().to_string()).collect()
    }

    #[test]
    fn iteration_follows_registration_order() -> Result<(), RegistryError> {
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("core", "math", noop)?;
        registry.register_fn("io", "file_read", noop)?;
        registry.register_fn("core", "loops", noop)?;

        // Cases are grouped by the category of their first registration.
        let expected = vec!["core::math", "core::loops", "io::file_read"];
        assert_eq!(names(&registry), expected);
        // Iteration can be restarted.
        assert_eq!(names(&registry), expected);
        assert_eq!(registry.categories().collect::<Vec<_>>(), vec!["core", "io"]);
        assert_eq!(registry.len(), 3);
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected() -> Result<(), RegistryError> {
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("core", "math", noop)?;

        let error = registry.register_fn("core", "math", noop);
        assert_eq!(
            error,
            Err(RegistryError::DuplicateName {
                category: "core".to_owned(),
                name: "math".to_owned()
            })
        );
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn same_name_in_other_category_is_allowed() -> Result<(), RegistryError> {
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("io", "read", noop)?;
        registry.register_fn("db", "read", noop)?;
        assert_eq!(names(&registry), vec!["io::read", "db::read"]);
        Ok(())
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut registry = BenchmarkRegistry::new();
        assert_eq!(
            registry.register_fn("", "math", noop),
            Err(RegistryError::EmptyName)
        );
        assert_eq!(
            registry.register_fn("core", "", noop),
            Err(RegistryError::EmptyName)
        );
        assert!(registry.is_empty());
    }
}
