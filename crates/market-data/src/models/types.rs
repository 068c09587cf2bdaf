use std::borrow::Cow;

/// Provider identifier - the name a fetcher is registered under
pub type ProviderId = Cow<'static, str>;
