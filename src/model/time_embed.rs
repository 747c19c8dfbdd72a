//! Sinusoidal timestep embedding
//!
//! A pure function of (timestep, width): even and odd halves carry sine and
//! cosine at logarithmically scaled frequencies, with an explicit zero pad
//! when the width is odd.

/// Embed a discrete timestep into a fixed-width vector.
pub fn sinusoidal_embedding(t: usize, dim: usize) -> Vec<f32> {
    let half = dim / 2;
    let denom = (half.saturating_sub(1)).max(1) as f64;

    let args: Vec<f64> = (0..half)
        .map(|i| {
            let freq = (-(10000f64.ln()) * i as f64 / denom).exp();
            t as f64 * freq
        })
        .collect();

    let mut emb = Vec::with_capacity(dim);
    emb.extend(args.iter().map(|a| a.sin() as f32));
    emb.extend(args.iter().map(|a| a.cos() as f32));
    if dim % 2 == 1 {
        emb.push(0.0);
    }
    emb
}
