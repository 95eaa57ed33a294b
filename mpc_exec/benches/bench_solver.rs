//! # MPC Solver Benchmark
//!
//! The solve runs synchronously inside the 100 Hz control cycle, so its
//! worst case must stay well under the cycle period.

use criterion::{criterion_group, criterion_main, Criterion};

use mpc_lib::mpc_ctrl::{self, MpcCtrl};
use util::module::State;

fn solver_benchmark(c: &mut Criterion) {
    // ---- Build a controller with the default tuning ----

    let mut mpc = MpcCtrl::default();
    mpc.init(mpc_ctrl::Params::default()).unwrap();

    // A representative mid-corner state: lateral offset, some heading error,
    // gently curving path
    let input = mpc_ctrl::InputData {
        cte_m: -0.3,
        epsi_rad: 0.1,
        speed_ms: 1.0,
        ref_v_ms: 2.0,
        coeffs: vec![-0.3, 0.1, 0.02, 0.0],
    };

    c.bench_function("mpc_solve", |b| {
        b.iter(|| mpc.proc(&input).unwrap());
    });
}

criterion_group!(benches, solver_benchmark);
criterion_main!(benches);
