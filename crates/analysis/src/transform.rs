//! Mapping callee storage into the context of a caller.
use exclusivity_ir::{
    AccessedStorage, FuncValue, InstData, Module, Value, ValueId,
    storage::find_accessed_storage_origin,
};

use crate::{
    AccessedStorageConfig,
    callee::{ApplySite, callee_list},
};

/// Returns the caller side value passed to the `param_index`th parameter of
/// the function called at `site`.
///
/// Parameters not supplied by the apply itself are looked up in the partial
/// applications the callee was formed from, following at most
/// `max_partial_apply_depth` of them. A partial application binds the
/// trailing parameters, so its first bound argument corresponds to the first
/// parameter not supplied by the applications outside of it.
pub fn caller_arg(
    module: &Module,
    site: ApplySite,
    param_index: usize,
    max_partial_apply_depth: usize,
) -> Option<ValueId> {
    let func = &module.funcs[site.caller];
    let (mut callee, args) = site.operands(module);
    if param_index < args.len() {
        return Some(args[param_index]);
    }

    let mut first_bound_index = args.len();
    for _ in 0..max_partial_apply_depth {
        let Some(InstData::PartialApply {
            callee: inner,
            args: bound,
        }) = func.dfg.value_inst_data(callee)
        else {
            return None;
        };

        let bound_index = param_index - first_bound_index;
        if bound_index < bound.len() {
            return Some(bound[bound_index]);
        }

        first_bound_index += bound.len();
        callee = *inner;
    }

    None
}

/// Maps storage accessed in a callee to the storage the caller sees through
/// the call at `site`.
///
/// Returns `None` for storage that can't be accessed from the caller.
///
/// # Panics
/// Panics on [`AccessedStorage::Nested`], which never appears in a summary.
pub fn transform_callee_storage(
    module: &Module,
    site: ApplySite,
    storage: &AccessedStorage,
    config: &AccessedStorageConfig,
) -> Option<AccessedStorage> {
    match *storage {
        AccessedStorage::Box { .. } | AccessedStorage::Stack { .. } => None,

        AccessedStorage::Global { .. } | AccessedStorage::Unidentified { .. } => Some(*storage),

        AccessedStorage::Class { object, field } => {
            let Some(arg) = param_to_caller_arg(module, site, object, config) else {
                return Some(*storage);
            };
            Some(AccessedStorage::Class {
                object: FuncValue::new(site.caller, arg),
                field,
            })
        }

        AccessedStorage::Argument { index, value } => {
            match caller_arg(module, site, index, config.max_partial_apply_depth) {
                Some(arg) => Some(find_accessed_storage_origin(
                    site.caller,
                    &module.funcs[site.caller],
                    arg,
                )),
                None => Some(AccessedStorage::Unidentified { value }),
            }
        }

        AccessedStorage::Nested { .. } => {
            panic!("nested access can't be transferred to a caller")
        }
    }
}

/// Returns the caller side value of `object` if it is a parameter of a
/// function called at `site`.
fn param_to_caller_arg(
    module: &Module,
    site: ApplySite,
    object: FuncValue,
    config: &AccessedStorageConfig,
) -> Option<ValueId> {
    let Value::Arg { idx } = module.funcs[object.func].dfg.value(object.value) else {
        return None;
    };

    // Only parameters of a function called here can be rebound. `object` may
    // also be a parameter of a function further down the call chain.
    if !callee_list(module, site).contains(object.func) {
        return None;
    }

    caller_arg(module, site, *idx, config.max_partial_apply_depth)
}
