pub mod api;
pub mod clock;
pub mod context;
pub mod error;
pub mod metrics;
pub mod remote;
pub mod repository;
pub mod resolver;
pub mod session_holder;
pub mod status_cache;
pub mod tenant;

pub use api::{AccountServiceApi, CallerContext, LocalAccountService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::AccountContext;
pub use error::AccountError;
pub use remote::{RemoteAccountClient, RemoteAccountConfig};
pub use repository::{AccountRepository, InMemoryAccountRepository};
pub use resolver::{
    AccountResolver, DomainAccountResolver, HeaderAccountResolver, PrincipalAccountResolver,
    RemoteAccountResolver, RequestAttributeResolver, RequestContext, ResolverRegistry,
    CURRENT_ACCOUNT_ID_ATTRIBUTE,
};
pub use session_holder::{AccountSessionHolder, MemorySessionStore, SessionScope};
pub use status_cache::AccountStatusCache;
pub use tenant::{AccountAware, QueryParameters, TenantStamper};
