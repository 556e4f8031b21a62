pub mod chat;
pub mod generator;
pub mod login;
pub mod settings;
pub mod shared;
pub mod sidebar;

pub use chat::ChatView;
pub use generator::GeneratorView;
pub use login::LoginView;
pub use settings::SettingsView;
pub use sidebar::Sidebar;
