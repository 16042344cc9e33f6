/// Forced navigation to the login entry point once a session cannot be recovered.
///
/// The transport fires this after it has cleared both tokens; the failing call
/// still returns its 401 to the caller.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

impl<F> LoginRedirect for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self();
    }
}
