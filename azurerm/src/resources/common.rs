//! Helpers shared by the load balancer resources and data sources
//!
//! Every child of a load balancer other than backend address pools is
//! stored on the parent, so create, update and delete are a locked
//! read-modify-write of the whole load balancer.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::models::{
    BackendAddressPool, FrontendIpConfiguration, InboundNatPool, InboundNatRule, LoadBalancer,
    LoadBalancingRule, OutboundRule, Probe,
};
use crate::api::{ApiError, Client};
use crate::ids::LoadBalancerId;
use crate::locks;
use crate::AzureLbProviderData;

/// Children of a load balancer addressed by name
pub(crate) trait Named {
    fn name(&self) -> Option<&str>;
}

macro_rules! impl_named {
    ($($model:ty),*) => {
        $(impl Named for $model {
            fn name(&self) -> Option<&str> {
                self.name.as_deref()
            }
        })*
    };
}

impl_named!(
    BackendAddressPool,
    FrontendIpConfiguration,
    InboundNatPool,
    InboundNatRule,
    LoadBalancingRule,
    OutboundRule,
    Probe
);

pub(crate) fn position_by_name<T: Named>(items: &[T], name: &str) -> Option<usize> {
    items.iter().position(|item| item.name() == Some(name))
}

pub(crate) fn find_by_name<'a, T: Named>(items: &'a [T], name: &str) -> Option<&'a T> {
    items.iter().find(|item| item.name() == Some(name))
}

/// Extracts the provider data handed over by `configure`
pub(crate) fn provider_data_from(
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> Result<AzureLbProviderData, Diagnostic> {
    match provider_data {
        Some(data) => data
            .downcast_ref::<AzureLbProviderData>()
            .cloned()
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract AzureLbProviderData from provider data",
                )
            }),
        None => Err(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        )),
    }
}

pub(crate) fn client(provider_data: &Option<AzureLbProviderData>) -> Result<&Client, Diagnostic> {
    provider_data
        .as_ref()
        .map(|data| data.client.as_ref())
        .ok_or_else(|| {
            Diagnostic::error(
                "Provider not configured",
                "Provider data was not properly configured",
            )
        })
}

/// Runs `operation` until it finishes or `ctx` is cancelled
pub(crate) async fn with_deadline<T, F>(
    ctx: &Context,
    action: &str,
    operation: F,
) -> Result<T, Diagnostic>
where
    F: Future<Output = Result<T, Diagnostic>>,
{
    tokio::select! {
        result = operation => result,
        _ = ctx.cancelled() => Err(Diagnostic::error(
            format!("Timed out {}", action),
            "The operation did not finish before its timeout or the provider was stopped",
        )),
    }
}

pub(crate) fn api_error(summary: &str, context: impl std::fmt::Display, error: ApiError) -> Diagnostic {
    Diagnostic::error(summary, format!("{}: {}", context, error))
}

// Attribute accessors. Null and unknown values read as None.

pub(crate) fn string(value: &DynamicValue, name: &str) -> Option<String> {
    value.get_string(&AttributePath::new(name)).ok()
}

pub(crate) fn required_string(value: &DynamicValue, name: &str) -> Result<String, Diagnostic> {
    string(value, name).ok_or_else(|| {
        Diagnostic::error(
            format!("Missing {}", name),
            format!("The '{}' attribute is required", name),
        )
        .with_attribute(AttributePath::new(name))
    })
}

pub(crate) fn int(value: &DynamicValue, name: &str) -> Option<i64> {
    value
        .get_number(&AttributePath::new(name))
        .ok()
        .map(|n| n as i64)
}

pub(crate) fn required_int(value: &DynamicValue, name: &str) -> Result<i64, Diagnostic> {
    int(value, name).ok_or_else(|| {
        Diagnostic::error(
            format!("Missing {}", name),
            format!("The '{}' attribute is required", name),
        )
        .with_attribute(AttributePath::new(name))
    })
}

pub(crate) fn boolean(value: &DynamicValue, name: &str) -> Option<bool> {
    value.get_bool(&AttributePath::new(name)).ok()
}

pub(crate) fn string_list(value: &DynamicValue, name: &str) -> Vec<String> {
    value
        .get_list(&AttributePath::new(name))
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_string().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn is_unknown(value: &DynamicValue, name: &str) -> bool {
    value
        .get(&AttributePath::new(name))
        .is_some_and(Dynamic::contains_unknown)
}

pub(crate) fn set_string(state: &mut DynamicValue, name: &str, value: impl Into<String>) {
    let _ = state.set_string(&AttributePath::new(name), value.into());
}

pub(crate) fn set_opt_string(state: &mut DynamicValue, name: &str, value: Option<&str>) {
    let path = AttributePath::new(name);
    let _ = match value {
        Some(v) => state.set_string(&path, v.to_string()),
        None => state.set_null(&path),
    };
}

pub(crate) fn set_opt_int(state: &mut DynamicValue, name: &str, value: Option<i64>) {
    let path = AttributePath::new(name);
    let _ = match value {
        Some(v) => state.set_number(&path, v as f64),
        None => state.set_null(&path),
    };
}

pub(crate) fn set_opt_bool(state: &mut DynamicValue, name: &str, value: Option<bool>) {
    let path = AttributePath::new(name);
    let _ = match value {
        Some(v) => state.set_bool(&path, v),
        None => state.set_null(&path),
    };
}

pub(crate) fn set_string_list(state: &mut DynamicValue, name: &str, values: Vec<String>) {
    let _ = state.set_list(
        &AttributePath::new(name),
        values.into_iter().map(Dynamic::String).collect(),
    );
}

/// Fetches the parent load balancer; None when it no longer exists
pub(crate) async fn get_load_balancer(
    client: &Client,
    id: &LoadBalancerId,
) -> Result<Option<LoadBalancer>, Diagnostic> {
    match client.load_balancers().get(id).await {
        Ok(lb) => Ok(Some(lb)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(api_error("Failed to retrieve Load Balancer", id, e)),
    }
}

pub(crate) async fn require_load_balancer(
    client: &Client,
    id: &LoadBalancerId,
) -> Result<LoadBalancer, Diagnostic> {
    get_load_balancer(client, id).await?.ok_or_else(|| {
        Diagnostic::error(
            "Load Balancer not found",
            format!("{} was not found", id),
        )
    })
}

/// ID of a frontend IP configuration that must exist on `lb`
pub(crate) fn frontend_ip_configuration_id(
    lb: &LoadBalancer,
    lb_id: &LoadBalancerId,
    name: &str,
) -> Result<String, Diagnostic> {
    match lb.frontend_ip_configuration(name) {
        Some(frontend) => Ok(frontend
            .id
            .clone()
            .unwrap_or_else(|| lb_id.frontend_ip_configuration(name).to_string())),
        None => Err(Diagnostic::error(
            "Frontend IP Configuration not found",
            format!(
                "Frontend IP Configuration {:?} was not found on {}",
                name, lb_id
            ),
        )
        .with_attribute(AttributePath::new("frontend_ip_configuration_name"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Mutation {
    Create,
    Update,
}

/// Inserts or replaces the child `name` in one of the parent's collections
/// and writes the parent back, holding the parent lock throughout
#[allow(clippy::too_many_arguments)]
pub(crate) async fn write_child<T, B>(
    ctx: &Context,
    client: &Client,
    lb_id: &LoadBalancerId,
    name: &str,
    label: &str,
    mutation: Mutation,
    collection: fn(&mut LoadBalancer) -> &mut Vec<T>,
    build: B,
) -> Result<(), Diagnostic>
where
    T: Named,
    B: FnOnce(&LoadBalancer) -> Result<T, Diagnostic>,
{
    let _lock = locks::by_name(&lb_id.name, locks::LOAD_BALANCER_KIND).await;

    let mut lb = require_load_balancer(client, lb_id).await?;
    let child = build(&lb)?;
    let items = collection(&mut lb);
    match (mutation, position_by_name(items, name)) {
        (Mutation::Create, Some(_)) => {
            return Err(Diagnostic::error(
                "Resource already exists",
                format!(
                    "A {} named {:?} already exists on {} - to be managed via Terraform this resource needs to be imported into the State",
                    label, name, lb_id
                ),
            ));
        }
        (Mutation::Create, None) => items.push(child),
        (Mutation::Update, Some(idx)) => items[idx] = child,
        (Mutation::Update, None) => {
            return Err(Diagnostic::error(
                format!("{} not found", label),
                format!("{} {:?} was not found on {}", label, name, lb_id),
            ));
        }
    }

    tracing::info!("Writing {} {:?} to {}", label, name, lb_id);
    client
        .load_balancers()
        .create_or_update(ctx, lb_id, &lb)
        .await
        .map_err(|e| {
            api_error(
                "Failed to update Load Balancer",
                format!("writing {} {:?} to {}", label, name, lb_id),
                e,
            )
        })
}

/// Removes the child `name` from the parent; a missing parent or child is
/// treated as already deleted
pub(crate) async fn remove_child<T: Named>(
    ctx: &Context,
    client: &Client,
    lb_id: &LoadBalancerId,
    name: &str,
    label: &str,
    collection: fn(&mut LoadBalancer) -> &mut Vec<T>,
) -> Result<(), Diagnostic> {
    let _lock = locks::by_name(&lb_id.name, locks::LOAD_BALANCER_KIND).await;

    let Some(mut lb) = get_load_balancer(client, lb_id).await? else {
        tracing::info!("{} is gone, nothing to delete for {} {:?}", lb_id, label, name);
        return Ok(());
    };
    let items = collection(&mut lb);
    let Some(idx) = position_by_name(items, name) else {
        tracing::info!("{} {:?} is already gone from {}", label, name, lb_id);
        return Ok(());
    };
    items.remove(idx);

    tracing::info!("Removing {} {:?} from {}", label, name, lb_id);
    client
        .load_balancers()
        .create_or_update(ctx, lb_id, &lb)
        .await
        .map_err(|e| {
            api_error(
                "Failed to update Load Balancer",
                format!("removing {} {:?} from {}", label, name, lb_id),
                e,
            )
        })
}

/// Looks up a child on the parent; None when either is missing
pub(crate) async fn read_child<T: Named + Clone>(
    client: &Client,
    lb_id: &LoadBalancerId,
    name: &str,
    collection: fn(&LoadBalancer) -> &Vec<T>,
) -> Result<Option<(LoadBalancer, T)>, Diagnostic> {
    let Some(lb) = get_load_balancer(client, lb_id).await? else {
        return Ok(None);
    };
    let child = find_by_name(collection(&lb), name).cloned();
    Ok(child.map(|child| (lb, child)))
}
