use std::env;
use std::io::{self, Cursor};

use crpt_format::{
    decrypt_stream, encrypt_stream, parse_header, read_header, FormatError, Silent,
    LENGTH_FIELD_LEN, MAX_EXTENSION_LEN,
};

const DEFAULT_ITERS: u64 = 500;
const DEFAULT_MAX_LEN: usize = 2048;
const DEFAULT_SEED: u64 = 0x5EED_C0DE_0BAD_F00D;
const PASSPHRASES: [&str; 3] = ["fuzz", "correct horse", "pässwörd"];

fn main() {
    let args: Vec<String> = env::args().collect();
    let iters = arg_value(&args, "--iters")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_ITERS);
    let max_len = arg_value(&args, "--max-len")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_LEN);
    let seed = env::var("CRPT_FUZZ_SEED")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SEED);

    let seeds = build_seeds();
    check_seed_roundtrips(&seeds);
    check_iv_freshness();

    let mut rng = XorShift64::new(seed);
    let mut stats = FuzzStats::default();

    for _ in 0..iters {
        let case = if rng.below(100) < 70 {
            mutated_case(&mut rng, &seeds, max_len)
        } else {
            random_case(&mut rng, max_len)
        };
        run_case(&mut stats, &case);
    }

    println!(
        "fuzz-lite completed: {iters} iterations (headers ok: {}, decrypt ok: {}, bad key: {}, other errors: {})",
        stats.header_ok, stats.decrypt_ok, stats.decrypt_failed, stats.other_err
    );
}

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let idx = args.iter().position(|arg| arg == name)?;
    args.get(idx + 1).map(String::as_str)
}

struct Seed {
    bytes: Vec<u8>,
    plaintext: Vec<u8>,
    passphrase: &'static str,
}

struct FuzzCase {
    bytes: Vec<u8>,
    passphrase: &'static str,
}

#[derive(Default)]
struct FuzzStats {
    header_ok: u64,
    decrypt_ok: u64,
    decrypt_failed: u64,
    other_err: u64,
}

fn encrypt_seed(plaintext: &[u8], extension: &str, passphrase: &str) -> Vec<u8> {
    let mut container = Vec::new();
    if let Err(err) = encrypt_stream(
        &mut Cursor::new(plaintext),
        &mut container,
        passphrase,
        extension,
        plaintext.len() as u64,
        &mut Silent,
    ) {
        panic!("seed encryption failed: {err}");
    }
    container
}

fn build_seeds() -> Vec<Seed> {
    let long_extension = format!(".{}", "x".repeat(MAX_EXTENSION_LEN - 1));
    let cases: [(&[u8], &str); 6] = [
        (b"", ""),
        (b"", ".txt"),
        (b"fifteen bytes!!", ".bin"),
        (b"exactly sixteen.", ".tar"),
        (&[0xAB; 100], ".jpeg"),
        (b"extension at the limit", long_extension.as_str()),
    ];

    cases
        .iter()
        .enumerate()
        .map(|(idx, (plaintext, extension))| {
            let passphrase = PASSPHRASES[idx % PASSPHRASES.len()];
            Seed {
                bytes: encrypt_seed(plaintext, extension, passphrase),
                plaintext: plaintext.to_vec(),
                passphrase,
            }
        })
        .collect()
}

fn check_seed_roundtrips(seeds: &[Seed]) {
    for seed in seeds {
        let mut out = Vec::new();
        let result = decrypt_stream(
            &mut Cursor::new(&seed.bytes),
            &mut out,
            seed.passphrase,
            seed.bytes.len() as u64,
            &mut Silent,
        );
        assert!(result.is_ok(), "seed failed to decrypt: {result:?}");
        assert_eq!(out, seed.plaintext, "seed plaintext mismatch");
    }
}

fn check_iv_freshness() {
    let first = encrypt_seed(b"same input", ".txt", PASSPHRASES[0]);
    let second = encrypt_seed(b"same input", ".txt", PASSPHRASES[0]);
    assert_ne!(first, second, "two encryptions produced identical containers");
}

fn mutated_case(rng: &mut XorShift64, seeds: &[Seed], max_len: usize) -> FuzzCase {
    let seed = &seeds[rng.below(seeds.len() as u64) as usize];
    let mut bytes = seed.bytes.clone();
    mutate(rng, &mut bytes, max_len);
    if rng.below(100) < 20 {
        splice(rng, &mut bytes, seeds, max_len);
    }
    // Mostly keep the right passphrase so mutations reach the padding check.
    let passphrase = if rng.below(4) == 0 {
        PASSPHRASES[rng.below(PASSPHRASES.len() as u64) as usize]
    } else {
        seed.passphrase
    };
    FuzzCase { bytes, passphrase }
}

fn random_case(rng: &mut XorShift64, max_len: usize) -> FuzzCase {
    let len = rng.below(max_len as u64 + 1) as usize;
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes);
    if bytes.len() >= LENGTH_FIELD_LEN && rng.below(2) == 0 {
        let declared = rng.below(MAX_EXTENSION_LEN as u64 + 8) as i32;
        bytes[..LENGTH_FIELD_LEN].copy_from_slice(&declared.to_le_bytes());
    }
    FuzzCase {
        bytes,
        passphrase: PASSPHRASES[rng.below(PASSPHRASES.len() as u64) as usize],
    }
}

fn run_case(stats: &mut FuzzStats, case: &FuzzCase) {
    let parsed = parse_header(&case.bytes);
    let streamed = read_header(&mut case.bytes.as_slice());
    match (&parsed, &streamed) {
        (Ok((a, a_len)), Ok((b, b_len))) => {
            assert_eq!(a, b, "header readers disagree");
            assert_eq!(*a_len as u64, *b_len, "header lengths disagree");
            stats.header_ok += 1;
        }
        (Err(_), Err(_)) => {}
        _ => panic!("header readers disagree: {parsed:?} vs {streamed:?}"),
    }

    let result = decrypt_stream(
        &mut Cursor::new(&case.bytes),
        &mut io::sink(),
        case.passphrase,
        case.bytes.len() as u64,
        &mut Silent,
    );
    match result {
        Ok(_) => stats.decrypt_ok += 1,
        Err(FormatError::DecryptionFailed) => stats.decrypt_failed += 1,
        Err(_) => stats.other_err += 1,
    }
}

fn mutate(rng: &mut XorShift64, bytes: &mut Vec<u8>, max_len: usize) {
    let rounds = 1 + rng.below(6);
    for _ in 0..rounds {
        match rng.below(7) {
            0 => xor_byte(rng, bytes),
            1 => insert_byte(rng, bytes, max_len),
            2 => remove_byte(rng, bytes),
            3 => truncate(rng, bytes),
            4 => rewrite_length_field(rng, bytes),
            5 => scramble_block(rng, bytes),
            _ => append_block(rng, bytes, max_len),
        }
    }
}

fn xor_byte(rng: &mut XorShift64, bytes: &mut [u8]) {
    if let Some(idx) = rng.index(bytes.len()) {
        bytes[idx] ^= (rng.next_u64() as u8) | 1;
    }
}

fn insert_byte(rng: &mut XorShift64, bytes: &mut Vec<u8>, max_len: usize) {
    if bytes.len() < max_len {
        let idx = rng.below(bytes.len() as u64 + 1) as usize;
        bytes.insert(idx, rng.next_u64() as u8);
    }
}

fn remove_byte(rng: &mut XorShift64, bytes: &mut Vec<u8>) {
    if let Some(idx) = rng.index(bytes.len()) {
        bytes.remove(idx);
    }
}

fn truncate(rng: &mut XorShift64, bytes: &mut Vec<u8>) {
    let len = rng.below(bytes.len() as u64 + 1) as usize;
    bytes.truncate(len);
}

/// Points the length prefix at boundaries: negative, zero, the limit, past it.
fn rewrite_length_field(rng: &mut XorShift64, bytes: &mut [u8]) {
    if bytes.len() < LENGTH_FIELD_LEN {
        return;
    }
    let limit = MAX_EXTENSION_LEN as i32;
    let declared = match rng.below(6) {
        0 => -1,
        1 => 0,
        2 => limit,
        3 => limit + 1,
        4 => i32::MAX,
        _ => rng.below(64) as i32,
    };
    bytes[..LENGTH_FIELD_LEN].copy_from_slice(&declared.to_le_bytes());
}

fn scramble_block(rng: &mut XorShift64, bytes: &mut [u8]) {
    let Some(start) = rng.index(bytes.len()) else {
        return;
    };
    let end = (start + 16).min(bytes.len());
    rng.fill(&mut bytes[start..end]);
}

fn append_block(rng: &mut XorShift64, bytes: &mut Vec<u8>, max_len: usize) {
    let room = max_len.saturating_sub(bytes.len()).min(16);
    let mut block = vec![0u8; room];
    rng.fill(&mut block);
    bytes.extend_from_slice(&block);
}

fn splice(rng: &mut XorShift64, bytes: &mut Vec<u8>, seeds: &[Seed], max_len: usize) {
    let other = &seeds[rng.below(seeds.len() as u64) as usize].bytes;
    let keep = rng.below(bytes.len() as u64 + 1) as usize;
    let from = rng.below(other.len() as u64 + 1) as usize;
    bytes.truncate(keep);
    bytes.extend_from_slice(&other[from..]);
    bytes.truncate(max_len);
}

struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform-ish value in `0..bound`; zero when `bound` is zero.
    fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.next_u64() % bound
    }

    fn index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.below(len as u64) as usize)
    }

    fn fill(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let word = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}
