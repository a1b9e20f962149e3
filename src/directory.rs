//! Who may act for whom. A batch names an actor plus target people; every
//! target must be the actor themselves or one of the actor's dependents.

use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;

use crate::model::{Ms, PersonId};

/// Resolves which people an actor may submit requests for.
pub trait PersonDirectory: Send + Sync {
    /// People managed by `actor`, not including `actor` themselves.
    fn dependents_of(&self, actor: PersonId) -> HashSet<PersonId>;

    /// Birth date, if recorded. Available for age-gated sessions.
    fn date_of_birth(&self, person: PersonId) -> Option<Ms>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum DirectoryError {
    AlreadyRegistered(PersonId),
    UnknownManager(PersonId),
    /// Dependents cannot manage other dependents.
    ManagerIsDependent(PersonId),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::AlreadyRegistered(p) => write!(f, "person already registered: {p}"),
            DirectoryError::UnknownManager(p) => write!(f, "unknown manager: {p}"),
            DirectoryError::ManagerIsDependent(p) => {
                write!(f, "manager is itself a dependent: {p}")
            }
        }
    }
}

impl std::error::Error for DirectoryError {}

#[derive(Debug, Clone)]
struct PersonRecord {
    manager: Option<PersonId>,
    date_of_birth: Option<Ms>,
}

/// In-process directory backed by DashMap. Account holders register
/// themselves, then register dependents under their own id.
pub struct InMemoryDirectory {
    people: DashMap<PersonId, PersonRecord>,
    dependents: DashMap<PersonId, HashSet<PersonId>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            people: DashMap::new(),
            dependents: DashMap::new(),
        }
    }

    /// Register a self-managing account holder.
    pub fn register_account(
        &self,
        person: PersonId,
        date_of_birth: Option<Ms>,
    ) -> Result<(), DirectoryError> {
        if self.people.contains_key(&person) {
            return Err(DirectoryError::AlreadyRegistered(person));
        }
        self.people.insert(
            person,
            PersonRecord {
                manager: None,
                date_of_birth,
            },
        );
        Ok(())
    }

    /// Register a dependent under `manager`. The manager must be a registered
    /// account holder, not a dependent.
    pub fn register_dependent(
        &self,
        person: PersonId,
        manager: PersonId,
        date_of_birth: Option<Ms>,
    ) -> Result<(), DirectoryError> {
        if self.people.contains_key(&person) {
            return Err(DirectoryError::AlreadyRegistered(person));
        }
        match self.people.get(&manager) {
            None => return Err(DirectoryError::UnknownManager(manager)),
            Some(rec) if rec.manager.is_some() => {
                return Err(DirectoryError::ManagerIsDependent(manager));
            }
            Some(_) => {}
        }
        self.people.insert(
            person,
            PersonRecord {
                manager: Some(manager),
                date_of_birth,
            },
        );
        self.dependents.entry(manager).or_default().insert(person);
        Ok(())
    }

    pub fn is_registered(&self, person: PersonId) -> bool {
        self.people.contains_key(&person)
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonDirectory for InMemoryDirectory {
    fn dependents_of(&self, actor: PersonId) -> HashSet<PersonId> {
        self.dependents
            .get(&actor)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    fn date_of_birth(&self, person: PersonId) -> Option<Ms> {
        self.people.get(&person).and_then(|rec| rec.date_of_birth)
    }
}
