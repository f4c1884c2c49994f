use std::cmp::Reverse;

use bytes::Bytes;
use hostevm_common::{Address, H256};
use keccak_hash::keccak;
use tracing::info;

use super::{
    DispatchError,
    abi::{self, Value},
    dispatcher::{Handler, HandlerContext},
    store::{AspectBinding, AspectMeta, AspectStore, Property},
};

/// Fixed cost of entering any handler.
pub const HANDLER_BASE_GAS: u64 = 1_000;
/// Maximum number of aspects a single contract can be bound to.
pub const MAX_BINDINGS: usize = 255;

/// Id of an aspect deployed by `caller` with `nonce`.
pub fn aspect_id(caller: Address, nonce: u64) -> Address {
    let mut preimage = caller.as_bytes().to_vec();
    preimage.extend_from_slice(&nonce.to_be_bytes());
    let hash: H256 = keccak(preimage);
    Address::from_slice(&hash.as_bytes()[12..])
}

fn properties(value: &Value) -> Result<Vec<Property>, DispatchError> {
    value
        .as_array()?
        .iter()
        .map(|entry| {
            let fields = entry.as_tuple()?;
            let (Some(key), Some(value)) = (fields.first(), fields.get(1)) else {
                return Err(DispatchError::InvalidInput(
                    "property must be a (string,bytes) pair".to_string(),
                ));
            };
            Ok(Property {
                key: key.as_str()?.to_string(),
                value: value.as_bytes()?.clone(),
            })
        })
        .collect()
}

fn ensure_caller(ctx: &HandlerContext<'_, '_>, expected: Address) -> Result<(), DispatchError> {
    if ctx.caller != expected {
        return Err(DispatchError::Unauthorized {
            caller: ctx.caller,
            expected,
        });
    }
    Ok(())
}

/// Resolves `version` (0 = latest) against the aspect's published versions.
fn resolve_version(aspect_id: Address, meta: &AspectMeta, version: u64) -> Result<u64, DispatchError> {
    match version {
        0 => Ok(meta.latest_version),
        version if version <= meta.latest_version => Ok(version),
        version => Err(DispatchError::VersionNotFound { aspect_id, version }),
    }
}

fn open_store<'s, 'a>(
    ctx: &'s mut HandlerContext<'_, 'a>,
    gas: u64,
) -> Result<AspectStore<'s, 'a>, DispatchError> {
    let mut store = AspectStore::new(&mut *ctx.state, gas, ctx.commit);
    store.charge(HANDLER_BASE_GAS)?;
    Ok(store)
}

pub struct DeployHandler;

impl Handler for DeployHandler {
    fn method(&self) -> &'static str {
        "deploy"
    }

    fn signature(&self) -> &'static str {
        "deploy(bytes,(string,bytes)[],address,bytes,uint256[])"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let code = ctx.param(0)?.as_bytes()?.clone();
        let properties = properties(ctx.param(1)?)?;
        let account = ctx.param(2)?.as_address()?;
        let join_points = ctx
            .param(4)?
            .as_array()?
            .iter()
            .try_fold(0u64, |mask, point| Ok::<_, DispatchError>(mask | point.as_u64()?))?;

        if code.is_empty() {
            return Err(DispatchError::EmptyCode);
        }
        ensure_caller(ctx, account)?;

        let id = aspect_id(ctx.caller, ctx.call.nonce);
        let span = ctx.span.clone();
        let mut store = open_store(ctx, gas)?;
        if store.meta(id)?.is_some() {
            return Err(DispatchError::AspectExists(id));
        }
        let meta = AspectMeta {
            owner: account,
            latest_version: 1,
            join_points,
        };
        store.set_meta(id, &meta)?;
        store.set_code(id, 1, code)?;
        store.set_properties(id, &properties)?;

        info!(parent: &span, aspect = ?id, owner = ?account, join_points, "Deployed aspect");
        Ok((abi::encode(&[Value::Address(id)]).into(), store.remaining_gas()))
    }
}

pub struct UpgradeHandler;

impl Handler for UpgradeHandler {
    fn method(&self) -> &'static str {
        "upgrade"
    }

    fn signature(&self) -> &'static str {
        "upgrade(address,bytes,(string,bytes)[])"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let id = ctx.param(0)?.as_address()?;
        let code = ctx.param(1)?.as_bytes()?.clone();
        let updates = properties(ctx.param(2)?)?;
        if code.is_empty() {
            return Err(DispatchError::EmptyCode);
        }

        let caller = ctx.caller;
        let span = ctx.span.clone();
        let mut store = open_store(ctx, gas)?;
        let mut meta = store.existing_meta(id)?;
        if meta.owner != caller {
            return Err(DispatchError::Unauthorized {
                caller,
                expected: meta.owner,
            });
        }

        meta.latest_version += 1;
        let mut properties = store.properties(id)?;
        for update in updates {
            match properties.iter_mut().find(|property| property.key == update.key) {
                Some(property) => property.value = update.value,
                None => properties.push(update),
            }
        }
        store.set_code(id, meta.latest_version, code)?;
        store.set_properties(id, &properties)?;
        store.set_meta(id, &meta)?;

        info!(parent: &span, aspect = ?id, version = meta.latest_version, "Upgraded aspect");
        Ok((
            abi::encode(&[Value::uint(meta.latest_version)]).into(),
            store.remaining_gas(),
        ))
    }
}

pub struct BindHandler;

impl Handler for BindHandler {
    fn method(&self) -> &'static str {
        "bind"
    }

    fn signature(&self) -> &'static str {
        "bind(address,uint256,address,int8)"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let id = ctx.param(0)?.as_address()?;
        let version = ctx.param(1)?.as_u64()?;
        let contract = ctx.param(2)?.as_address()?;
        let priority = ctx.param(3)?.as_i8()?;
        ensure_caller(ctx, contract)?;

        let span = ctx.span.clone();
        let mut store = open_store(ctx, gas)?;
        let meta = store.existing_meta(id)?;
        let version = resolve_version(id, &meta, version)?;

        let mut bindings = store.bindings(contract)?;
        if bindings.iter().any(|binding| binding.aspect_id == id) {
            return Err(DispatchError::AlreadyBound {
                aspect_id: id,
                contract,
            });
        }
        if bindings.len() >= MAX_BINDINGS {
            return Err(DispatchError::BindingLimit(contract));
        }
        bindings.push(AspectBinding {
            aspect_id: id,
            version,
            priority,
        });
        let mut bound = store.bound_addresses(id)?;
        bound.push(contract);
        store.set_bindings(contract, &bindings)?;
        store.set_bound_addresses(id, &bound)?;

        info!(parent: &span, aspect = ?id, contract = ?contract, version, priority, "Bound aspect");
        Ok((Bytes::new(), store.remaining_gas()))
    }
}

pub struct UnbindHandler;

impl Handler for UnbindHandler {
    fn method(&self) -> &'static str {
        "unbind"
    }

    fn signature(&self) -> &'static str {
        "unbind(address,address)"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let id = ctx.param(0)?.as_address()?;
        let contract = ctx.param(1)?.as_address()?;
        ensure_caller(ctx, contract)?;

        let span = ctx.span.clone();
        let mut store = open_store(ctx, gas)?;
        let mut bindings = store.bindings(contract)?;
        let Some(position) = bindings.iter().position(|binding| binding.aspect_id == id) else {
            return Err(DispatchError::NotBound {
                aspect_id: id,
                contract,
            });
        };
        bindings.remove(position);
        let mut bound = store.bound_addresses(id)?;
        bound.retain(|address| *address != contract);
        store.set_bindings(contract, &bindings)?;
        store.set_bound_addresses(id, &bound)?;

        info!(parent: &span, aspect = ?id, contract = ?contract, "Unbound aspect");
        Ok((Bytes::new(), store.remaining_gas()))
    }
}

pub struct ChangeVersionHandler;

impl Handler for ChangeVersionHandler {
    fn method(&self) -> &'static str {
        "changeversion"
    }

    fn signature(&self) -> &'static str {
        "changeVersion(address,address,uint64)"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let id = ctx.param(0)?.as_address()?;
        let contract = ctx.param(1)?.as_address()?;
        let version = ctx.param(2)?.as_u64()?;
        ensure_caller(ctx, contract)?;

        let span = ctx.span.clone();
        let mut store = open_store(ctx, gas)?;
        let meta = store.existing_meta(id)?;
        let version = resolve_version(id, &meta, version)?;
        let mut bindings = store.bindings(contract)?;
        let Some(binding) = bindings.iter_mut().find(|binding| binding.aspect_id == id) else {
            return Err(DispatchError::NotBound {
                aspect_id: id,
                contract,
            });
        };
        binding.version = version;
        store.set_bindings(contract, &bindings)?;

        info!(parent: &span, aspect = ?id, contract = ?contract, version, "Changed bound aspect version");
        Ok((Bytes::new(), store.remaining_gas()))
    }
}

pub struct GetVersionHandler;

impl Handler for GetVersionHandler {
    fn method(&self) -> &'static str {
        "versionof"
    }

    fn signature(&self) -> &'static str {
        "versionOf(address)"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let id = ctx.param(0)?.as_address()?;
        let mut store = open_store(ctx, gas)?;
        let version = store.meta(id)?.map_or(0, |meta| meta.latest_version);
        Ok((abi::encode(&[Value::uint(version)]).into(), store.remaining_gas()))
    }
}

pub struct GetBindingHandler;

impl Handler for GetBindingHandler {
    fn method(&self) -> &'static str {
        "aspectsof"
    }

    fn signature(&self) -> &'static str {
        "aspectsOf(address)"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let contract = ctx.param(0)?.as_address()?;
        let mut store = open_store(ctx, gas)?;
        let mut bindings = store.bindings(contract)?;
        bindings.sort_by_key(|binding| (Reverse(binding.priority), binding.aspect_id));

        let entries = bindings
            .into_iter()
            .map(|binding| {
                Value::Tuple(vec![
                    Value::Address(binding.aspect_id),
                    Value::uint(binding.version),
                    Value::int(binding.priority.into()),
                ])
            })
            .collect();
        Ok((
            abi::encode(&[Value::Array(entries)]).into(),
            store.remaining_gas(),
        ))
    }
}

pub struct GetBoundAddressHandler;

impl Handler for GetBoundAddressHandler {
    fn method(&self) -> &'static str {
        "boundaddressesof"
    }

    fn signature(&self) -> &'static str {
        "boundAddressesOf(address)"
    }

    fn handle(&self, ctx: &mut HandlerContext<'_, '_>, gas: u64) -> Result<(Bytes, u64), DispatchError> {
        let id = ctx.param(0)?.as_address()?;
        let mut store = open_store(ctx, gas)?;
        let contracts = store
            .bound_addresses(id)?
            .into_iter()
            .map(Value::Address)
            .collect();
        Ok((
            abi::encode(&[Value::Array(contracts)]).into(),
            store.remaining_gas(),
        ))
    }
}
