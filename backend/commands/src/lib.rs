pub mod category;
pub mod detection;
pub mod dispatch;
pub mod handlers;
pub mod registry;
pub mod table;
pub mod types;

pub use category::CategoryValidator;
pub use detection::{convert_value, detect_command};
pub use dispatch::{command_factory, Command, CommandEnv, CommandFactory, CommandRouter};
pub use handlers::register_builtins;
pub use registry::CommandRegistry;
pub use table::{CommandHost, CommandListing, CommandTable};
pub use types::{
    CommandInput, CommandSource, CommandSpec, CATEGORY_GENERAL, CATEGORY_PLUGIN, CATEGORY_SYSTEM,
};
