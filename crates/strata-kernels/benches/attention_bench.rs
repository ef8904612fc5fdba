//! Benchmark: causal GQA attention and the projection around it, sequential
//! vs row-parallel.

use std::time::Instant;

use strata_core::{DType, Tensor};
use strata_kernels::{linear, self_attention, set_config, KernelConfig};

fn data(n: usize, salt: usize) -> Vec<f32> {
    (0..n).map(|i| ((i * 7 + salt) % 13) as f32 * 0.1 - 0.6).collect()
}

fn bench<F: Fn()>(f: F, iters: usize) -> f64 {
    f();
    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn attention_case(seqlen: usize, total: usize, nhead: usize, nkvhead: usize, d: usize, dtype: DType) -> impl Fn() {
    let q = Tensor::from_f32_as(&data(seqlen * nhead * d, 3), &[seqlen, nhead, d], dtype).unwrap();
    let k = Tensor::from_f32_as(&data(total * nkvhead * d, 5), &[total, nkvhead, d], dtype).unwrap();
    let v = Tensor::from_f32_as(&data(total * nkvhead * d, 11), &[total, nkvhead, d], dtype).unwrap();
    let out = Tensor::zeros(&[seqlen, nhead, d], dtype).unwrap();
    let scale = 1.0 / (d as f32).sqrt();
    move || self_attention(&out, &q, &k, &v, scale).unwrap()
}

fn linear_case(rows: usize, in_f: usize, out_f: usize, dtype: DType) -> impl Fn() {
    let x = Tensor::from_f32_as(&data(rows * in_f, 1), &[rows, in_f], dtype).unwrap();
    let w = Tensor::from_f32_as(&data(out_f * in_f, 2), &[out_f, in_f], dtype).unwrap();
    let out = Tensor::zeros(&[rows, out_f], dtype).unwrap();
    move || linear(&out, &x, &w, None).unwrap()
}

fn main() {
    println!("=== strata attention benchmark ===\n");
    println!(
        "{:<34} {:>14} {:>14} {:>9}",
        "Case", "Seq (ms)", "Par (ms)", "Speedup"
    );
    println!("{}", "-".repeat(74));

    let parallel = KernelConfig {
        parallel: true,
        min_parallel_rows: 2,
    };

    // (seqlen, total, nhead, nkvhead, d)
    let shapes: &[(usize, usize, usize, usize, usize)] = &[
        (1, 512, 32, 8, 128),
        (64, 64, 32, 8, 64),
        (256, 256, 32, 8, 64),
    ];
    for dtype in [DType::F32, DType::BF16] {
        for &(seqlen, total, nhead, nkvhead, d) in shapes {
            let case = attention_case(seqlen, total, nhead, nkvhead, d, dtype);
            let iters = if seqlen >= 256 { 3 } else { 20 };

            set_config(KernelConfig::sequential());
            let seq_s = bench(&case, iters);
            set_config(parallel);
            let par_s = bench(&case, iters);

            let label = format!("attn {dtype} s={seqlen} t={total} h={nhead}/{nkvhead}");
            println!(
                "{:<34} {:>12.3}ms {:>12.3}ms {:>8.1}x",
                label,
                seq_s * 1e3,
                par_s * 1e3,
                seq_s / par_s
            );
        }
    }

    for &(rows, in_f, out_f) in &[(64, 1024, 1024), (256, 2048, 2048)] {
        let case = linear_case(rows, in_f, out_f, DType::F32);
        set_config(KernelConfig::sequential());
        let seq_s = bench(&case, 5);
        set_config(parallel);
        let par_s = bench(&case, 5);
        let label = format!("linear f32 {rows}x{in_f}->{out_f}");
        println!(
            "{:<34} {:>12.3}ms {:>12.3}ms {:>8.1}x",
            label,
            seq_s * 1e3,
            par_s * 1e3,
            seq_s / par_s
        );
    }
}
