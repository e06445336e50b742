pub mod controller;
pub mod traits;

pub use controller::{
    EphemeralTabOptions, ManagedTab, NoopTabObserver, TabController, TabLifecycleObserver,
};
pub use traits::{BrowserHost, TabId, TabInfo};
