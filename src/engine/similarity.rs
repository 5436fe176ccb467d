//! 跨來源店名相似度（Ratcliff/Obershelp）

use regex::Regex;
use std::sync::OnceLock;

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"))
}

fn foreign_char_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[^0-9A-Za-z\p{Hangul}]").expect("character class pattern is valid")
    })
}

/// 去除 HTML 標記、英數與韓文以外的字元，轉小寫
pub fn normalize_name(name: &str) -> String {
    let without_markup = markup_pattern().replace_all(name, "");
    foreign_char_pattern()
        .replace_all(&without_markup, "")
        .to_lowercase()
}

/// `2M / T`：M 為反覆取最長共同子字串所得的匹配總長，T 為兩字串長度和。
/// 任一方正規化後為空字串時回傳 0。
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize_name(a).chars().collect();
    let b: Vec<char> = normalize_name(b).chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = queue.pop() {
        let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        total += size;
        if a_lo < i && b_lo < j {
            queue.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            queue.push((i + size, a_hi, j + size, b_hi));
        }
    }
    total
}

/// 區間內最長共同子字串；同長時取 a 中最早、再取 b 中最早者
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);
    let width = b_hi - b_lo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let col = j - b_lo + 1;
            curr[col] = if a[i] == b[j] { prev[col - 1] + 1 } else { 0 };
            if curr[col] > best_size {
                best_size = curr[col];
                best_i = i + 1 - best_size;
                best_j = j + 1 - best_size;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    (best_i, best_j, best_size)
}
