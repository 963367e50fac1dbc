//! Composable permission policies.
//!
//! Every handler declares the policies it runs under. Request-level checks
//! happen before any row is touched; object-level checks run once the target
//! row has been loaded. The first failing policy rejects the request.

use axum::http::Method;
use uuid::Uuid;

use crate::api::middleware::auth::AuthExtension;
use crate::error::{AppError, Result};

/// Group whose members may report violations and hand out tasks.
pub const REPRESENTATIVE_GROUP: &str = "representative";

const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided";
const PERMISSION_DENIED: &str = "You do not have permission to perform this action";

/// The users an object belongs to, as far as permission checks care.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectOwners {
    pub creator: Option<Uuid>,
    pub executor: Option<Uuid>,
    pub author: Option<Uuid>,
}

/// Implemented by rows that take part in object-level checks.
pub trait OwnedObject {
    fn owners(&self) -> ObjectOwners;
}

/// What a permission policy gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub auth: Option<&'a AuthExtension>,
}

impl<'a> RequestContext<'a> {
    pub fn new(method: &'a Method, auth: &'a AuthExtension) -> Self {
        Self {
            method,
            auth: Some(auth),
        }
    }

    pub fn anonymous(method: &'a Method) -> Self {
        Self { method, auth: None }
    }

    fn user_id(&self) -> Option<Uuid> {
        self.auth.map(|a| a.user_id)
    }

    fn is_representative(&self) -> bool {
        self.auth
            .map(|a| a.in_group(REPRESENTATIVE_GROUP))
            .unwrap_or(false)
    }
}

/// GET, HEAD and OPTIONS never modify state.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// A permission policy with a request-level and an object-level check.
pub trait Permission: Send + Sync {
    fn has_permission(&self, _ctx: &RequestContext<'_>) -> bool {
        true
    }

    fn has_object_permission(&self, _ctx: &RequestContext<'_>, _owners: &ObjectOwners) -> bool {
        true
    }
}

/// Any authenticated user.
pub struct IsAuthenticated;

impl Permission for IsAuthenticated {
    fn has_permission(&self, ctx: &RequestContext<'_>) -> bool {
        ctx.auth.is_some()
    }
}

/// Members of the representative group.
pub struct IsRepresentative;

impl Permission for IsRepresentative {
    fn has_permission(&self, ctx: &RequestContext<'_>) -> bool {
        ctx.is_representative()
    }
}

/// Representatives, and only on objects they created.
pub struct IsRepresentativeAndCreator;

impl Permission for IsRepresentativeAndCreator {
    fn has_permission(&self, ctx: &RequestContext<'_>) -> bool {
        ctx.is_representative()
    }

    fn has_object_permission(&self, ctx: &RequestContext<'_>, owners: &ObjectOwners) -> bool {
        ctx.is_representative() && ctx.user_id().is_some() && owners.creator == ctx.user_id()
    }
}

/// Reads for everyone, writes for representatives.
pub struct IsRepresentativeOrReadOnly;

impl Permission for IsRepresentativeOrReadOnly {
    fn has_permission(&self, ctx: &RequestContext<'_>) -> bool {
        is_safe_method(ctx.method) || ctx.is_representative()
    }
}

/// The creator or the executor of the object.
pub struct IsCreatorOrExecutor;

impl Permission for IsCreatorOrExecutor {
    fn has_object_permission(&self, ctx: &RequestContext<'_>, owners: &ObjectOwners) -> bool {
        match ctx.user_id() {
            Some(user) => owners.creator == Some(user) || owners.executor == Some(user),
            None => false,
        }
    }
}

/// Reads for everyone, writes for the object's author.
pub struct IsAuthorOrReadOnly;

impl Permission for IsAuthorOrReadOnly {
    fn has_object_permission(&self, ctx: &RequestContext<'_>, owners: &ObjectOwners) -> bool {
        if is_safe_method(ctx.method) {
            return true;
        }
        ctx.user_id().is_some() && owners.author == ctx.user_id()
    }
}

fn deny(ctx: &RequestContext<'_>) -> AppError {
    match ctx.auth {
        None => AppError::Unauthorized(NOT_AUTHENTICATED.to_string()),
        Some(_) => AppError::Authorization(PERMISSION_DENIED.to_string()),
    }
}

/// Run the request-level check of every policy.
pub fn check_permissions(policies: &[&dyn Permission], ctx: &RequestContext<'_>) -> Result<()> {
    if policies.iter().all(|p| p.has_permission(ctx)) {
        Ok(())
    } else {
        Err(deny(ctx))
    }
}

/// Run the object-level check of every policy against a loaded row.
pub fn check_object_permissions(
    policies: &[&dyn Permission],
    ctx: &RequestContext<'_>,
    object: &impl OwnedObject,
) -> Result<()> {
    let owners = object.owners();
    if policies
        .iter()
        .all(|p| p.has_object_permission(ctx, &owners))
    {
        Ok(())
    } else {
        Err(deny(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(groups: &[&str]) -> AuthExtension {
        AuthExtension {
            user_id: Uuid::new_v4(),
            username: "someone".to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            is_admin: false,
        }
    }

    struct Row(ObjectOwners);

    impl OwnedObject for Row {
        fn owners(&self) -> ObjectOwners {
            self.0
        }
    }

    fn created_by(id: Uuid) -> Row {
        Row(ObjectOwners {
            creator: Some(id),
            ..Default::default()
        })
    }

    #[test]
    fn test_safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::PATCH));
        assert!(!is_safe_method(&Method::DELETE));
    }

    #[test]
    fn test_anonymous_gets_unauthorized_not_forbidden() {
        let ctx = RequestContext::anonymous(&Method::GET);
        let err = check_permissions(&[&IsAuthenticated], &ctx).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_representative_required() {
        let rep = user(&[REPRESENTATIVE_GROUP]);
        let contractor = user(&["contractor"]);

        let ctx = RequestContext::new(&Method::GET, &rep);
        assert!(check_permissions(&[&IsRepresentative], &ctx).is_ok());

        let ctx = RequestContext::new(&Method::GET, &contractor);
        let err = check_permissions(&[&IsRepresentative], &ctx).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[test]
    fn test_non_creator_cannot_update_violation() {
        let owner = user(&[REPRESENTATIVE_GROUP]);
        let other = user(&[REPRESENTATIVE_GROUP]);
        let row = created_by(owner.user_id);

        let ctx = RequestContext::new(&Method::PATCH, &owner);
        assert!(check_object_permissions(&[&IsRepresentativeAndCreator], &ctx, &row).is_ok());

        let ctx = RequestContext::new(&Method::PATCH, &other);
        let err =
            check_object_permissions(&[&IsRepresentativeAndCreator], &ctx, &row).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[test]
    fn test_creator_who_left_group_loses_access() {
        let owner = user(&[]);
        let row = created_by(owner.user_id);
        let ctx = RequestContext::new(&Method::GET, &owner);
        assert!(check_object_permissions(&[&IsRepresentativeAndCreator], &ctx, &row).is_err());
    }

    #[test]
    fn test_representative_or_read_only() {
        let contractor = user(&["contractor"]);
        let rep = user(&[REPRESENTATIVE_GROUP]);
        let policies: &[&dyn Permission] = &[&IsRepresentativeOrReadOnly, &IsAuthenticated];

        assert!(check_permissions(policies, &RequestContext::new(&Method::GET, &contractor)).is_ok());
        assert!(
            check_permissions(policies, &RequestContext::new(&Method::POST, &contractor)).is_err()
        );
        assert!(check_permissions(policies, &RequestContext::new(&Method::POST, &rep)).is_ok());
        assert!(check_permissions(policies, &RequestContext::anonymous(&Method::GET)).is_err());
    }

    #[test]
    fn test_creator_or_executor() {
        let creator = user(&[REPRESENTATIVE_GROUP]);
        let executor = user(&["contractor"]);
        let stranger = user(&["contractor"]);
        let row = Row(ObjectOwners {
            creator: Some(creator.user_id),
            executor: Some(executor.user_id),
            author: None,
        });

        for who in [&creator, &executor] {
            let ctx = RequestContext::new(&Method::PUT, who);
            assert!(check_object_permissions(&[&IsCreatorOrExecutor], &ctx, &row).is_ok());
        }
        let ctx = RequestContext::new(&Method::GET, &stranger);
        assert!(check_object_permissions(&[&IsCreatorOrExecutor], &ctx, &row).is_err());
    }

    #[test]
    fn test_author_or_read_only() {
        let author = user(&[]);
        let reader = user(&[]);
        let row = Row(ObjectOwners {
            author: Some(author.user_id),
            ..Default::default()
        });

        let ctx = RequestContext::new(&Method::GET, &reader);
        assert!(check_object_permissions(&[&IsAuthorOrReadOnly], &ctx, &row).is_ok());

        let ctx = RequestContext::new(&Method::DELETE, &reader);
        assert!(check_object_permissions(&[&IsAuthorOrReadOnly], &ctx, &row).is_err());

        let ctx = RequestContext::new(&Method::DELETE, &author);
        assert!(check_object_permissions(&[&IsAuthorOrReadOnly], &ctx, &row).is_ok());
    }

    #[test]
    fn test_object_without_owner_denies_owner_policies() {
        let someone = user(&[REPRESENTATIVE_GROUP]);
        let row = Row(ObjectOwners::default());
        let ctx = RequestContext::new(&Method::PATCH, &someone);
        assert!(check_object_permissions(&[&IsRepresentativeAndCreator], &ctx, &row).is_err());
        assert!(check_object_permissions(&[&IsCreatorOrExecutor], &ctx, &row).is_err());
        assert!(check_object_permissions(&[&IsAuthorOrReadOnly], &ctx, &row).is_err());
    }

    #[test]
    fn test_admin_has_no_implicit_bypass() {
        let mut admin = user(&[]);
        admin.is_admin = true;
        let ctx = RequestContext::new(&Method::POST, &admin);
        assert!(check_permissions(&[&IsRepresentative], &ctx).is_err());
    }

    #[test]
    fn test_empty_policy_list_allows() {
        let ctx = RequestContext::anonymous(&Method::DELETE);
        assert!(check_permissions(&[], &ctx).is_ok());
    }
}
