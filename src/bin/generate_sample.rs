//! Writes demo measurement files plus a `job.toml` that processes them.
//!
//! Usage: `generate_sample [DIR]` (default `demo`), then `rusty-etl run -c DIR/job.toml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_pattern(
    two_theta: &[f64],
    peaks: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    two_theta
        .iter()
        .map(|&angle| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(angle, mu, sigma, amp))
                .sum();
            (signal + 20.0 + rng.gauss(0.0, noise_level)).max(0.0)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_csv(path: &Path, header: &[&str], columns: &[Vec<String>]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
    for row in 0..rows {
        writer.write_record(columns.iter().map(|c| c.get(row).map_or("", String::as_str)))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, time: Vec<f64>, mass: Vec<f64>, segment: Vec<i64>) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Float64, false),
        Field::new("mass", DataType::Float64, false),
        Field::new("segment", DataType::Int64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(time)),
            Arc::new(Float64Array::from(mass)),
            Arc::new(Int64Array::from(segment)),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

const JOB: &str = r#"[[source]]
name = "xrd"
unique_variables = ["two_theta", "intensity"]
column_labels = ["2θ (°)", "Intensity (counts)", "Offset Intensity", "Normalized", "Sample Total", "Dataset Total"]
start_row = 1
entry_separation = 1
sample_separation = 2
excel_row_offset = 1
excel_column_offset = 1

[source.styles.header_even]
fill = "F9B381"
bold = true

[[source.function]]
name = "offset"
kind = "calculation"
routine = "offset"
target_columns = ["intensity"]
added_columns = 1
options = { offset = 250.0 }

[[source.function]]
name = "normalized"
kind = "calculation"
routine = "normalize"
target_columns = ["intensity"]
added_columns = 1

[[source.function]]
name = "sample_total"
kind = "sample_summary"
routine = "sample_sum"
target_columns = ["intensity"]
added_columns = 1

[[source.function]]
name = "dataset_total"
kind = "dataset_summary"
routine = "dataset_sum"
target_columns = ["sample_total"]
added_columns = 1

[[source.dataset]]
sheet_name = "XRD"

[[source.dataset.sample]]
name = "Quartz"
entries = ["quartz_1.csv", "quartz_2.csv"]

[[source.dataset.sample]]
name = "Cristobalite"
entries = ["cristobalite_1.csv", "cristobalite_2.csv"]

[[source]]
name = "tga"
unique_variables = ["time", "mass", "segment"]
column_labels = ["Time (min)", "Mass (%)"]
entry_separation = 1
sample_separation = 1

[[source.function]]
name = "segments"
kind = "preprocess"
routine = "split_segments"
target_columns = ["segment"]
deleted_columns = ["segment"]

[[source.dataset]]
sheet_name = "TGA"

[[source.dataset.sample]]
name = "Kaolinite"
entries = ["kaolinite.parquet"]
"#;

fn main() -> Result<()> {
    env_logger::init();

    let dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "demo".to_string()));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let two_theta: Vec<f64> = (0..1400).map(|i| 10.0 + i as f64 * 0.05).collect();

    let quartz = [(20.9, 0.08, 300.0), (26.6, 0.08, 1000.0), (50.1, 0.1, 150.0)];
    let cristobalite = [(21.9, 0.1, 900.0), (36.1, 0.1, 120.0)];

    for (name, peaks) in [("quartz", &quartz[..]), ("cristobalite", &cristobalite[..])] {
        for n in 1..=2 {
            let y = generate_pattern(&two_theta, peaks, 5.0 * n as f64, &mut rng);
            let path = dir.join(format!("{name}_{n}.csv"));
            write_csv(
                &path,
                &["two_theta", "intensity"],
                &[
                    two_theta.iter().map(|v| format!("{v:.2}")).collect(),
                    y.iter().map(|v| format!("{v:.3}")).collect(),
                ],
            )?;
        }
    }

    // three heating segments: ramp, isotherm, ramp
    let mut time = Vec::new();
    let mut mass = Vec::new();
    let mut segment = Vec::new();
    for i in 0..300 {
        let t = i as f64 * 0.5;
        let loss = 14.0 / (1.0 + (-(t - 90.0) / 6.0).exp());
        time.push(t);
        mass.push(100.0 - loss + rng.gauss(0.0, 0.02));
        segment.push(match i {
            0..=99 => 1,
            100..=149 => 2,
            _ => 3,
        });
    }
    write_parquet(&dir.join("kaolinite.parquet"), time, mass, segment)?;

    let job = dir.join("job.toml");
    std::fs::write(&job, JOB).with_context(|| format!("writing {}", job.display()))?;

    println!(
        "Wrote 5 measurement files and {} ({} points per scan)",
        job.display(),
        two_theta.len()
    );
    Ok(())
}
