//! Activation: locating or instantiating objects by identifier or by a
//! requirement query.
//!
//! The resolver only depends on the [`Activation`] trait. [`LocalActivation`]
//! is an in-process server registry that understands the conjunctive
//! requirement strings the resolver itself builds:
//!
//! ```text
//! repo_ids.has('IDL:Stream:1.0') AND supported_mime_types.has('text/plain')
//! (iid == 'Demo_Editor') AND repo_ids.has('IDL:PersistStream:1.0')
//! ```
//!
//! `repo_ids` matches the server's interfaces (normalized), `iid` its
//! identifier, and any other field one of its attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::ResolveOptions;
use crate::error::{MonikerError, MonikerResult};
use crate::interface::InterfaceId;
use crate::object::ObjectRef;

bitflags! {
    /// Activation behaviour flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ActivationFlags: u32 {
        /// Do not activate servers living in the caller's process.
        const NO_LOCAL = 1 << 0;
        /// Only return already running instances.
        const EXISTING_ONLY = 1 << 2;
    }
}

/// Locates or creates objects.
pub trait Activation: Send + Sync {
    /// Activate the first server satisfying `requirements`.
    fn activate(
        &self,
        requirements: &str,
        sort: &[String],
        flags: ActivationFlags,
        options: &ResolveOptions,
    ) -> MonikerResult<Option<ObjectRef>>;

    /// Activate the server registered under `iid`.
    fn activate_from_id(
        &self,
        iid: &str,
        flags: ActivationFlags,
        options: &ResolveOptions,
    ) -> MonikerResult<Option<ObjectRef>>;
}

/// Description of an activatable server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Implementation identifier.
    pub iid: String,

    /// Interfaces the server's objects implement.
    pub repo_ids: Vec<InterfaceId>,

    /// Multi-valued attributes, e.g. `supported_mime_types`.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl ServerInfo {
    pub fn new(iid: impl Into<String>) -> Self {
        Self {
            iid: iid.into(),
            repo_ids: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an implemented interface.
    pub fn with_repo_id(mut self, interface: impl Into<InterfaceId>) -> Self {
        self.repo_ids.push(interface.into());
        self
    }

    /// Add values to an attribute.
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    fn field_has(&self, field: &str, value: &str) -> bool {
        match field {
            "repo_ids" => {
                let wanted = InterfaceId::new(value);
                self.repo_ids.contains(&wanted)
            }
            "iid" => self.iid == value,
            _ => self
                .attributes
                .get(field)
                .is_some_and(|values| values.iter().any(|v| v == value)),
        }
    }
}

type Factory = Arc<dyn Fn() -> MonikerResult<ObjectRef> + Send + Sync>;

struct Server {
    info: ServerInfo,
    factory: Option<Factory>,
    instance: Option<ObjectRef>,
}

/// In-process server registry.
#[derive(Default)]
pub struct LocalActivation {
    servers: RwLock<Vec<Server>>,
}

impl LocalActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server that creates a new object per activation.
    pub fn register<F>(&self, info: ServerInfo, factory: F)
    where
        F: Fn() -> MonikerResult<ObjectRef> + Send + Sync + 'static,
    {
        debug!(iid = %info.iid, "registered activatable server");
        self.servers.write().push(Server {
            info,
            factory: Some(Arc::new(factory)),
            instance: None,
        });
    }

    /// Register an already running object.
    pub fn register_object(&self, info: ServerInfo, object: ObjectRef) {
        debug!(iid = %info.iid, "registered running server");
        self.servers.write().push(Server {
            info,
            factory: None,
            instance: Some(object),
        });
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }

    fn instantiate<P>(&self, flags: ActivationFlags, mut matches: P) -> MonikerResult<Option<ObjectRef>>
    where
        P: FnMut(&ServerInfo) -> bool,
    {
        // Every server held here lives in this process.
        if flags.contains(ActivationFlags::NO_LOCAL) {
            return Ok(None);
        }

        let factory = {
            let servers = self.servers.read();
            let Some(server) = servers.iter().find(|s| {
                matches(&s.info)
                    && (!flags.contains(ActivationFlags::EXISTING_ONLY) || s.instance.is_some())
            }) else {
                return Ok(None);
            };

            if let Some(instance) = &server.instance {
                return Ok(Some(instance.clone()));
            }
            server.factory.clone()
        };

        // Factories run without the registry lock held.
        match factory {
            Some(factory) => factory().map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for LocalActivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let servers = self.servers.read();
        f.debug_struct("LocalActivation")
            .field(
                "servers",
                &servers.iter().map(|s| s.info.iid.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Activation for LocalActivation {
    fn activate(
        &self,
        requirements: &str,
        sort: &[String],
        flags: ActivationFlags,
        _options: &ResolveOptions,
    ) -> MonikerResult<Option<ObjectRef>> {
        let terms = parse_requirements(requirements)?;
        debug!(requirements, ?sort, "activating by query");
        self.instantiate(flags, |info| terms.iter().all(|t| t.matches(info)))
    }

    fn activate_from_id(
        &self,
        iid: &str,
        flags: ActivationFlags,
        _options: &ResolveOptions,
    ) -> MonikerResult<Option<ObjectRef>> {
        debug!(iid, "activating by id");
        self.instantiate(flags, |info| info.iid == iid)
    }
}

/// One conjunct of a requirement string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Has { field: String, value: String },
    Equals { field: String, value: String },
}

impl Term {
    fn matches(&self, info: &ServerInfo) -> bool {
        match self {
            Self::Has { field, value } | Self::Equals { field, value } => {
                info.field_has(field, value)
            }
        }
    }
}

fn parse_requirements(requirements: &str) -> MonikerResult<Vec<Term>> {
    let mut parser = QueryParser {
        src: requirements,
        pos: 0,
    };
    let terms = parser.conjunction()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(terms)
}

struct QueryParser<'a> {
    src: &'a str,
    pos: usize,
}

impl QueryParser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        let matched = self
            .rest()
            .get(..token.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(token));
        if matched {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn error(&self, reason: &str) -> MonikerError {
        MonikerError::General {
            message: format!(
                "unsupported activation query {:?} at offset {}: {reason}",
                self.src, self.pos
            ),
        }
    }

    fn conjunction(&mut self) -> MonikerResult<Vec<Term>> {
        let mut terms = self.atom()?;
        loop {
            self.skip_ws();
            let rest = self.rest();
            let is_and = rest.get(..3).is_some_and(|kw| kw.eq_ignore_ascii_case("AND"))
                && rest[3..].starts_with(|c: char| c.is_whitespace() || c == '(');
            if !is_and {
                return Ok(terms);
            }
            self.pos += 3;
            terms.extend(self.atom()?);
        }
    }

    fn atom(&mut self) -> MonikerResult<Vec<Term>> {
        if self.eat("(") {
            let terms = self.conjunction()?;
            if !self.eat(")") {
                return Err(self.error("expected ')'"));
            }
            return Ok(terms);
        }

        let field = self.field()?;
        if self.eat(".has") {
            if !self.eat("(") {
                return Err(self.error("expected '(' after .has"));
            }
            let value = self.string()?;
            if !self.eat(")") {
                return Err(self.error("expected ')'"));
            }
            Ok(vec![Term::Has { field, value }])
        } else if self.eat("==") {
            let value = self.string()?;
            Ok(vec![Term::Equals { field, value }])
        } else {
            Err(self.error("expected .has(...) or =="))
        }
    }

    fn field(&mut self) -> MonikerResult<String> {
        self.skip_ws();
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-')))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error("expected field name"));
        }
        let field = self.rest()[..len].to_string();
        self.pos += len;
        Ok(field)
    }

    fn string(&mut self) -> MonikerResult<String> {
        if !self.eat("'") {
            return Err(self.error("expected quoted string"));
        }
        let Some(len) = self.rest().find('\'') else {
            return Err(self.error("unterminated string"));
        };
        let value = self.rest()[..len].to_string();
        self.pos += len + 1;
        Ok(value)
    }
}
