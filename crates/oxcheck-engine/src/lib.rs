//! Runtime core of the check pipeline.
//!
//! Raw sections of a host are parsed ([`sections`]), services are discovered
//! and merged into the persisted autochecks ([`discovery`]), and every
//! autocheck is evaluated ([`checking`]) with parameters resolved from
//! defaults, rules and the autocheck itself ([`parameters`]). [`host::Engine`]
//! runs these steps as one cycle per host.

pub mod checking;
pub mod crash;
pub mod discovery;
pub mod host;
pub mod parameters;
pub mod sections;


pub use checking::{aggregate, evaluate, Evaluation};
pub use discovery::{DiscoveryMode, DiscoveryReport, Transition};
pub use host::{Engine, EngineError, HostCheckReport, ServiceReport};
pub use parameters::{NoRules, ParameterResolver, RulePrecedence, RulesetSource};
pub use sections::RawSections;
