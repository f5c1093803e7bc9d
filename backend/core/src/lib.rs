pub mod bus;
pub mod error;
pub mod event;
pub mod report;
pub mod ui;

pub use bus::{from_fn, EventBus, EventHandler};
pub use error::{
    BoxError, CommandError, ConfigError, ErrorCategory, ErrorContext, ErrorKind, ErrorSeverity,
    EventError, PluginError, SecurityError, ShellError, ViolationType,
};
pub use event::{names, Event, EventSnapshot, OperationContext};
pub use report::{ErrorReport, ErrorReporter};
pub use ui::{CapturedUi, MessageLevel, Ui};
