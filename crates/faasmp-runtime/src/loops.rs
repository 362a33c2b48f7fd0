//! Static work-sharing distributor
//!
//! Computes each team member's slice of a `#pragma omp for` iteration space.
//! The arithmetic follows the LLVM OpenMP runtime's static init: signed
//! wrapping throughout, with the trip count carried in the matching unsigned
//! width so `upper - lower` cannot overflow the numerator.

use crate::error::RuntimeError;

/// Guest-observable schedule constants, matching LLVM's `sched_type` values
/// for the two schedules the distributor implements.
pub const SCH_STATIC_CHUNKED: i32 = 33;
pub const SCH_STATIC: i32 = 34;

/// Loop schedules the distributor handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Round-robin chunks of a fixed size
    StaticChunked,
    /// One contiguous block per thread
    Static,
}

impl TryFrom<i32> for ScheduleKind {
    type Error = RuntimeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            SCH_STATIC_CHUNKED => Ok(Self::StaticChunked),
            SCH_STATIC => Ok(Self::Static),
            other => Err(RuntimeError::UnimplementedSchedule(other)),
        }
    }
}

/// One thread's slice of a parallel loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSpan<T> {
    pub lower: T,
    pub upper: T,
    pub stride: T,
    pub last_iter: bool,
}

macro_rules! plan_static_impl {
    ($(#[$meta:meta])* $name:ident, $ity:ty, $uty:ty) => {
        $(#[$meta])*
        pub fn $name(
            num_threads: i32,
            thread_num: i32,
            schedule: ScheduleKind,
            lower: $ity,
            upper: $ity,
            incr: $ity,
            chunk: $ity,
        ) -> StaticSpan<$ity> {
            let nth = num_threads as $ity;
            let tid = thread_num as $ity;

            if num_threads == 1 {
                let stride = if incr > 0 {
                    upper.wrapping_sub(lower).wrapping_add(1)
                } else {
                    lower.wrapping_sub(upper).wrapping_add(1).wrapping_neg()
                };
                return StaticSpan {
                    lower,
                    upper,
                    stride,
                    last_iter: true,
                };
            }

            let trip_count: $uty = if incr == 1 {
                upper.wrapping_sub(lower).wrapping_add(1) as $uty
            } else if incr == -1 {
                lower.wrapping_sub(upper).wrapping_add(1) as $uty
            } else if incr > 0 {
                (upper.wrapping_sub(lower) / incr).wrapping_add(1) as $uty
            } else {
                (lower.wrapping_sub(upper) / incr.wrapping_neg()).wrapping_add(1) as $uty
            };

            match schedule {
                ScheduleKind::StaticChunked => {
                    let chunk = if chunk < 1 { 1 } else { chunk };
                    let span = chunk.wrapping_mul(incr);
                    let stride = span.wrapping_mul(nth);
                    let lower = lower.wrapping_add(span.wrapping_mul(tid));
                    let upper = lower.wrapping_add(span).wrapping_sub(incr);
                    let last_chunk_owner =
                        (trip_count.wrapping_sub(1) / chunk as $uty) % nth as $uty;
                    StaticSpan {
                        lower,
                        upper,
                        stride,
                        last_iter: tid as $uty == last_chunk_owner,
                    }
                }
                ScheduleKind::Static => {
                    let mut lower = lower;
                    let mut upper = upper;
                    let last_iter;

                    if trip_count < nth as $uty {
                        tracing::warn!(
                            trip_count = trip_count as u64,
                            num_threads,
                            "loop has fewer iterations than team members"
                        );
                        if (tid as $uty) < trip_count {
                            lower = lower.wrapping_add(tid.wrapping_mul(incr));
                            upper = lower;
                        } else {
                            // Empty range: one increment past the end
                            lower = upper.wrapping_add(incr);
                        }
                        last_iter = tid as $uty == trip_count.wrapping_sub(1);
                    } else {
                        let small_chunk = trip_count / nth as $uty;
                        let extras = trip_count % nth as $uty;
                        let tid_u = tid as $uty;
                        let offset = tid_u
                            .wrapping_mul(small_chunk)
                            .wrapping_add(if tid_u < extras { tid_u } else { extras });
                        lower = lower.wrapping_add(incr.wrapping_mul(offset as $ity));
                        upper = lower
                            .wrapping_add((small_chunk as $ity).wrapping_mul(incr))
                            .wrapping_sub(if tid_u < extras { 0 } else { incr });
                        last_iter = thread_num == num_threads - 1;
                    }

                    StaticSpan {
                        lower,
                        upper,
                        stride: trip_count as $ity,
                        last_iter,
                    }
                }
            }
        }
    };
}

plan_static_impl!(
    /// Plan a thread's slice of a loop with 32-bit induction variables.
    plan_static_i32,
    i32,
    u32
);

plan_static_impl!(
    /// Plan a thread's slice of a loop with 64-bit induction variables.
    plan_static_i64,
    i64,
    u64
);
