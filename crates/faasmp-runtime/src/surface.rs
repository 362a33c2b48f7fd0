//! Host-function registry
//!
//! Embedders import the OpenMP surface into their wasm linker by name. Each
//! entry pairs an import symbol (module `env`) with a marshalling closure
//! that checks arity and operand widths before dispatching to the typed
//! intrinsic. A marshalling failure is a trap, same as any other invalid
//! guest argument the runtime cannot recover from.

use crate::error::{Result, RuntimeError};
use crate::intrinsics;
use std::collections::HashMap;

/// Wasm core value as passed across the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostValue {
    I32(i32),
    I64(i64),
}

impl HostValue {
    pub fn as_i32(self) -> Option<i32> {
        match self {
            HostValue::I32(value) => Some(value),
            HostValue::I64(_) => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            HostValue::I64(value) => Some(value),
            HostValue::I32(_) => None,
        }
    }
}

fn arg_i32(args: &[HostValue], index: usize) -> Result<i32> {
    args.get(index)
        .and_then(|value| value.as_i32())
        .ok_or_else(|| RuntimeError::InvalidArguments(format!("operand {index} must be an i32")))
}

fn arg_i64(args: &[HostValue], index: usize) -> Result<i64> {
    args.get(index)
        .and_then(|value| value.as_i64())
        .ok_or_else(|| RuntimeError::InvalidArguments(format!("operand {index} must be an i64")))
}

type HostClosure = Box<dyn Fn(&[HostValue]) -> Result<Option<HostValue>> + Send + Sync>;

/// One importable host function.
pub struct HostFunction {
    /// Import module; always `env` for this surface
    pub module: &'static str,
    /// Exact import symbol, e.g. `__kmpc_fork_call`
    pub symbol: &'static str,
    /// Number of operands the symbol takes
    pub param_count: usize,
    invoke: HostClosure,
}

impl HostFunction {
    fn new(
        symbol: &'static str,
        param_count: usize,
        invoke: impl Fn(&[HostValue]) -> Result<Option<HostValue>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            module: "env",
            symbol,
            param_count,
            invoke: Box::new(invoke),
        }
    }

    /// Invoke with marshalled operands, checking arity first.
    pub fn invoke(&self, args: &[HostValue]) -> Result<Option<HostValue>> {
        if args.len() != self.param_count {
            return Err(RuntimeError::InvalidArguments(format!(
                "{} takes {} operands, got {}",
                self.symbol,
                self.param_count,
                args.len()
            )));
        }
        (self.invoke)(args)
    }
}

/// Every host function the OpenMP surface exports, in import order.
pub fn host_functions() -> Vec<HostFunction> {
    use HostValue::{I32, I64};

    vec![
        HostFunction::new("omp_get_thread_num", 0, |_| {
            Ok(Some(I32(intrinsics::omp_get_thread_num()?)))
        }),
        HostFunction::new("omp_get_num_threads", 0, |_| {
            Ok(Some(I32(intrinsics::omp_get_num_threads()?)))
        }),
        HostFunction::new("omp_get_max_threads", 0, |_| {
            Ok(Some(I32(intrinsics::omp_get_max_threads()?)))
        }),
        HostFunction::new("omp_get_level", 0, |_| {
            Ok(Some(I32(intrinsics::omp_get_level()?)))
        }),
        HostFunction::new("omp_get_max_active_levels", 0, |_| {
            Ok(Some(I32(intrinsics::omp_get_max_active_levels()?)))
        }),
        HostFunction::new("omp_set_max_active_levels", 1, |args| {
            intrinsics::omp_set_max_active_levels(arg_i32(args, 0)?)?;
            Ok(None)
        }),
        HostFunction::new("omp_set_num_threads", 1, |args| {
            intrinsics::omp_set_num_threads(arg_i32(args, 0)?)?;
            Ok(None)
        }),
        HostFunction::new("omp_get_num_devices", 0, |_| {
            Ok(Some(I32(intrinsics::omp_get_num_devices()?)))
        }),
        HostFunction::new("omp_set_default_device", 1, |args| {
            intrinsics::omp_set_default_device(arg_i32(args, 0)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_barrier", 2, |args| {
            intrinsics::kmpc_barrier(arg_i32(args, 0)?, arg_i32(args, 1)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_critical", 3, |args| {
            intrinsics::kmpc_critical(arg_i32(args, 0)?, arg_i32(args, 1)?, arg_i32(args, 2)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_end_critical", 3, |args| {
            intrinsics::kmpc_end_critical(arg_i32(args, 0)?, arg_i32(args, 1)?, arg_i32(args, 2)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_flush", 1, |args| {
            intrinsics::kmpc_flush(arg_i32(args, 0)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_master", 2, |args| {
            Ok(Some(I32(intrinsics::kmpc_master(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
            )?)))
        }),
        HostFunction::new("__kmpc_end_master", 2, |args| {
            intrinsics::kmpc_end_master(arg_i32(args, 0)?, arg_i32(args, 1)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_single", 2, |args| {
            Ok(Some(I32(intrinsics::kmpc_single(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
            )?)))
        }),
        HostFunction::new("__kmpc_end_single", 2, |args| {
            intrinsics::kmpc_end_single(arg_i32(args, 0)?, arg_i32(args, 1)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_push_num_threads", 3, |args| {
            intrinsics::kmpc_push_num_threads(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
                arg_i32(args, 2)?,
            )?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_global_thread_num", 1, |args| {
            Ok(Some(I32(intrinsics::kmpc_global_thread_num(arg_i32(
                args, 0,
            )?)?)))
        }),
        HostFunction::new("__kmpc_fork_call", 4, |args| {
            intrinsics::kmpc_fork_call(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
                arg_i32(args, 2)?,
                arg_i32(args, 3)?,
            )?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_for_static_init_4", 9, |args| {
            intrinsics::kmpc_for_static_init_4(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
                arg_i32(args, 2)?,
                arg_i32(args, 3)?,
                arg_i32(args, 4)?,
                arg_i32(args, 5)?,
                arg_i32(args, 6)?,
                arg_i32(args, 7)?,
                arg_i32(args, 8)?,
            )?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_for_static_init_8", 9, |args| {
            intrinsics::kmpc_for_static_init_8(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
                arg_i32(args, 2)?,
                arg_i32(args, 3)?,
                arg_i32(args, 4)?,
                arg_i32(args, 5)?,
                arg_i32(args, 6)?,
                arg_i64(args, 7)?,
                arg_i64(args, 8)?,
            )?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_for_static_fini", 2, |args| {
            intrinsics::kmpc_for_static_fini(arg_i32(args, 0)?, arg_i32(args, 1)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_reduce", 7, |args| {
            Ok(Some(I32(intrinsics::kmpc_reduce(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
                arg_i32(args, 2)?,
                arg_i32(args, 3)?,
                arg_i32(args, 4)?,
                arg_i32(args, 5)?,
                arg_i32(args, 6)?,
            )?)))
        }),
        HostFunction::new("__kmpc_reduce_nowait", 7, |args| {
            Ok(Some(I32(intrinsics::kmpc_reduce_nowait(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
                arg_i32(args, 2)?,
                arg_i32(args, 3)?,
                arg_i32(args, 4)?,
                arg_i32(args, 5)?,
                arg_i32(args, 6)?,
            )?)))
        }),
        HostFunction::new("__kmpc_end_reduce", 3, |args| {
            intrinsics::kmpc_end_reduce(arg_i32(args, 0)?, arg_i32(args, 1)?, arg_i32(args, 2)?)?;
            Ok(None)
        }),
        HostFunction::new("__kmpc_end_reduce_nowait", 3, |args| {
            intrinsics::kmpc_end_reduce_nowait(
                arg_i32(args, 0)?,
                arg_i32(args, 1)?,
                arg_i32(args, 2)?,
            )?;
            Ok(None)
        }),
        HostFunction::new("__faasmp_incrby", 2, |args| {
            Ok(Some(I64(intrinsics::faasmp_incrby(
                arg_i32(args, 0)?,
                arg_i64(args, 1)?,
            )?)))
        }),
        HostFunction::new("__faasmp_getLong", 1, |args| {
            Ok(Some(I64(intrinsics::faasmp_get_long(arg_i32(args, 0)?)?)))
        }),
        HostFunction::new("__faasmp_debug_copy", 2, |args| {
            intrinsics::faasmp_debug_copy(arg_i32(args, 0)?, arg_i32(args, 1)?)?;
            Ok(None)
        }),
    ]
}

/// Symbol-indexed view of the surface.
pub struct IntrinsicSurface {
    by_symbol: HashMap<&'static str, HostFunction>,
}

impl IntrinsicSurface {
    pub fn new() -> Self {
        Self {
            by_symbol: host_functions()
                .into_iter()
                .map(|function| (function.symbol, function))
                .collect(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&HostFunction> {
        self.by_symbol.get(symbol)
    }

    /// Look a symbol up and invoke it in one step.
    pub fn invoke(&self, symbol: &str, args: &[HostValue]) -> Result<Option<HostValue>> {
        let function = self
            .get(symbol)
            .ok_or_else(|| RuntimeError::InvalidArguments(format!("unknown symbol: {symbol}")))?;
        function.invoke(args)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

impl Default for IntrinsicSurface {
    fn default() -> Self {
        Self::new()
    }
}
