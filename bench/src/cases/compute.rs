use super::{BenchContext, BenchRegistry};
use envbench_harness::{Outcome, RegistryError};
use md5::Md5;
use regex::Regex;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::hint::black_box;

const SAMPLE_TEXT: &str = "<i>the</i> quick brown fox jumps over the lazy dog  ";
const LINK_TEXT: &str = "this is a link to https://google.com which is a really popular site";

pub(super) fn register(registry: &mut BenchRegistry) -> Result<(), RegistryError> {
    registry.register_fn("core", "math", math)?;
    registry.register_fn("core", "loops", loops)?;
    registry.register_fn("core", "ifelse", if_else)?;
    registry.register_fn("core", "match", match_arms)?;
    registry.register_fn("core", "string", string)?;
    registry.register_fn("core", "collections", collections)?;
    registry.register_fn("core", "regex", regular_expressions)?;
    registry.register_fn("core", "type_check", type_check)?;
    registry.register_fn("core", "hash", hash)?;
    registry.register_fn("core", "json", json)
}

#[allow(clippy::cast_precision_loss)]
fn math(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(200_000);
    let mut x = 0.0_f64;
    for i in 0..count {
        let f = black_box(i as f64);
        x += f + f;
        x += f * f;
        x += f.powf(f);
        x += f / ((f + 1.0) * 2.0);
        x += f % ((f + 1.0) * 2.0);
        black_box((
            f.abs(),
            f.acos(),
            f.acosh(),
            f.asin(),
            f.asinh(),
            f.atan2(f),
            f.atan(),
            f.atanh(),
            f.ceil(),
            f.cos(),
            f.cosh(),
            f.exp(),
            f.exp_m1(),
            f.floor(),
            f.hypot(f),
        ));
        black_box((
            f.is_infinite(),
            f.is_finite(),
            f.is_nan(),
            f.log10(),
            f.ln_1p(),
            f.ln(),
            f.to_degrees(),
            f.to_radians(),
            f.sin(),
            f.sinh(),
            f.sqrt(),
            f.tan(),
            f.tanh(),
            std::f64::consts::PI,
        ));
        black_box((format!("{i:b}"), format!("{i:x}"), format!("{i:o}")));
    }
    black_box(x);
    Ok(Outcome::Completed(count))
}

fn loops(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(20_000_000);
    for i in 0..count {
        black_box(i);
    }
    let mut i = 0;
    while i < count {
        i = black_box(i) + 1;
    }
    Ok(Outcome::Completed(i))
}

fn if_else(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(10_000_000);
    let (mut a, mut b) = (0_u64, 0_u64);
    for i in 0..count {
        let k = black_box(i) % 4;
        if k == 0 {
            black_box(i);
        } else if k == 1 {
            a = i;
        } else if k == 2 {
            b = i;
        } else {
            black_box(i);
        }
    }
    black_box(a.wrapping_sub(b));
    Ok(Outcome::Completed(count))
}

fn match_arms(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(10_000_000);
    let (mut a, mut b) = (0_u64, 0_u64);
    for i in 0..count {
        match black_box(i) % 4 {
            0 => {
                black_box(i);
            }
            1 => a = i,
            2 => b = i,
            _ => {}
        }
    }
    black_box(a.wrapping_sub(b));
    Ok(Outcome::Completed(count))
}

fn string(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(50_000);
    for _ in 0..count {
        let s = black_box(SAMPLE_TEXT);
        black_box(s.escape_default().to_string());
        black_box(hex::encode(s));
        black_box(chunk_split(s, 76));
        black_box(byte_histogram(s));
        black_box(s.split(' ').collect::<Vec<_>>());
        black_box(escape_html(s));
        black_box(Md5::digest(s));
        black_box(s.chars().next().map(u32::from));
        black_box(s.trim_end());
        black_box(Sha1::digest(s));
        black_box(s.to_lowercase().replace("fox", "cat"));
        black_box(format!("{s:<50}"));
        black_box(s.repeat(10));
        black_box(s.replace("fox", "cat"));
        black_box(rot13(s));
        black_box(s.split_whitespace().count());
        black_box(strip_tags(s));
        black_box(s.find("fox"));
        black_box(s.len());
        black_box(s.to_lowercase());
        black_box(s.to_uppercase());
        black_box(s.matches("the").count());
        black_box(s.trim());
        black_box(capitalize_words(s));
    }
    Ok(Outcome::Completed(count))
}

/// Inserts `\r\n` after every `chunk_len` bytes.
fn chunk_split(s: &str, chunk_len: usize) -> String {
    s.as_bytes()
        .chunks(chunk_len)
        .map(|chunk| format!("{}\r\n", String::from_utf8_lossy(chunk)))
        .collect()
}

fn byte_histogram(s: &str) -> BTreeMap<u8, usize> {
    let mut histogram = BTreeMap::new();
    for byte in s.bytes() {
        *histogram.entry(byte).or_insert(0) += 1;
    }
    histogram
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[allow(clippy::cast_possible_truncation)]
fn rot13(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='m' | 'A'..='M' => char::from(c as u8 + 13),
            'n'..='z' | 'N'..='Z' => char::from(c as u8 - 13),
            _ => c,
        })
        .collect()
}

/// Removes everything between `<` and `>`.
fn strip_tags(s: &str) -> String {
    let mut in_tag = false;
    s.chars()
        .filter(|c| match c {
            '<' => {
                in_tag = true;
                false
            }
            '>' if in_tag => {
                in_tag = false;
                false
            }
            _ => !in_tag,
        })
        .collect()
}

fn capitalize_words(s: &str) -> String {
    let mut at_word_start = true;
    s.chars()
        .map(|c| {
            let mapped = if at_word_start {
                c.to_ascii_uppercase()
            } else {
                c
            };
            at_word_start = c.is_whitespace();
            mapped
        })
        .collect()
}

fn collections(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(20_000);
    let values = (0..=100_u64).collect::<Vec<_>>();
    for _ in 0..count {
        let v = black_box(&values);
        black_box((0..v.len()).collect::<Vec<_>>());
        black_box(v.clone());
        black_box(
            v.iter()
                .enumerate()
                .map(|(i, x)| (*x, i))
                .collect::<HashMap<_, _>>(),
        );
        black_box(v.iter().map(|x| x * 2).collect::<Vec<_>>());
        for x in v {
            black_box(x);
        }
        black_box(v.iter().rev().copied().collect::<Vec<_>>());
        black_box(v.iter().sum::<u64>());

        let mut merged = v.clone();
        merged.extend([101, 102, 103]);
        black_box(merged);

        let mut replaced = v.clone();
        replaced[..3].copy_from_slice(&[1, 2, 3]);
        black_box(replaced);

        black_box(v.chunks(2).map(<[u64]>::to_vec).collect::<Vec<_>>());
    }
    Ok(Outcome::Completed(count))
}

fn regular_expressions(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(1_000_000);
    let link = Regex::new(r"http[s]?://\w+[^\s\[\]<]+")?;
    let anchor = Regex::new(r"(?i)(^|\s)(http[s]?://\w+[^\s\[\]<]+)")?;
    for _ in 0..count {
        let text = black_box(LINK_TEXT);
        black_box(link.is_match(text));
        black_box(anchor.replace_all(text, r#"$1<a href="$2">$2</a>"#));
    }
    Ok(Outcome::Completed(count))
}

struct Marker;

fn type_check(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(2_500_000);
    let values: Vec<Box<dyn Any>> = vec![
        Box::new(vec![1]),
        Box::new("1"),
        Box::new(1_i64),
        Box::new(String::from("abc")),
        Box::new(true),
        Box::new(1.3_f64),
        Box::new(Marker),
    ];
    for _ in 0..count {
        for value in black_box(&values) {
            let value = value.as_ref();
            black_box((
                value.is::<Vec<i32>>(),
                value.is::<i64>(),
                value.is::<&str>(),
                value.is::<String>(),
                value.is::<bool>(),
                value.is::<f64>(),
                value.is::<Marker>(),
            ));
        }
        black_box(black_box("hi").parse::<f64>().is_ok());
        black_box(black_box("123").parse::<f64>().is_ok());
    }
    Ok(Outcome::Completed(count))
}

fn hash(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(10_000);
    for i in 0..count {
        let input = black_box(i.to_string());
        black_box(Md5::digest(&input));
        black_box(Sha1::digest(&input));
        black_box(Sha256::digest(&input));
        black_box(Sha512::digest(&input));

        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        black_box(hasher.finish());
    }
    Ok(Outcome::Completed(count))
}

fn json(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let count = ctx.scaled(100_000);
    let data = [
        ("foo", "bar"),
        ("bar", "baz"),
        ("baz", "qux"),
        ("qux", "quux"),
        ("quux", "corge"),
        ("corge", "grault"),
        ("grault", "garply"),
        ("garply", "waldo"),
        ("waldo", "fred"),
        ("fred", "plugh"),
        ("plugh", "xyzzy"),
        ("xyzzy", "thud"),
        ("thud", "end"),
    ]
    .into_iter()
    .collect::<BTreeMap<_, _>>();

    for _ in 0..count {
        let encoded = serde_json::to_string(black_box(&data))?;
        let decoded = serde_json::from_str::<serde_json::Value>(&encoded)?;
        black_box(decoded);
    }
    Ok(Outcome::Completed(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_helpers() {
        assert_eq!(rot13("Hello, World"), "Uryyb, Jbeyq");
        assert_eq!(strip_tags(SAMPLE_TEXT), "the quick brown fox jumps over the lazy dog  ");
        assert_eq!(capitalize_words("the quick  fox"), "The Quick  Fox");
        assert_eq!(escape_html("<a>"), "&lt;a&gt;");
        assert_eq!(chunk_split("abcde", 2), "ab\r\ncd\r\ne\r\n");
        assert_eq!(byte_histogram("aab").get(&b'a'), Some(&2));
    }

    #[test]
    fn link_patterns_match() {
        let anchor = Regex::new(r"(?i)(^|\s)(http[s]?://\w+[^\s\[\]<]+)").unwrap();
        assert_eq!(
            anchor.replace_all(LINK_TEXT, r#"$1<a href="$2">$2</a>"#),
            "this is a link to <a href=\"https://google.com\">https://google.com</a> which is a \
             really popular site"
        );
    }
}
