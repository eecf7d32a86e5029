/// 标准化时原样保留的标点
const ALLOWED_PUNCTUATION: &str = "[]()（）{}【】「」『』《》、。，．!！?？ -_";

/// 字母数字与空白转小写，允许的标点保留，其余字符替换为空格
pub fn normalize_filename(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() || c.is_whitespace() {
            normalized.extend(c.to_lowercase());
        } else if ALLOWED_PUNCTUATION.contains(c) {
            normalized.push(c);
        } else {
            normalized.push(' ');
        }
    }
    normalized
}

/// 相似度 0..=100，即 `2 * LCS / (|a| + |b|)` 四舍五入，任一方为空时为 0
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let lcs = longest_common_subsequence(&a, &b);
    let score = 200.0 * lcs as f64 / (a.len() + b.len()) as f64;
    score.round() as u8
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("Hello World.PDF"), "hello world pdf");
        assert_eq!(normalize_filename("[作者] 标题：副标题.pdf"), "[作者] 标题 副标题 pdf");
        assert_eq!(normalize_filename("【汉化】Title!(1)"), "【汉化】title!(1)");
        assert_eq!(normalize_filename("a~b#c"), "a b c");
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("abc", "abc"), 100);
        assert_eq!(ratio("abcd", "abce"), 75);
        assert_eq!(ratio("abc", "xyz"), 0);
        assert_eq!(ratio("", "abc"), 0);
        assert_eq!(ratio("标题", "标题二"), 80);
    }
}
