use once_cell::sync::Lazy;
use regex::Regex;

/// 标题长度上限（字符数），给 ".pdf" 后缀留出空间
const MAX_TITLE_CHARS: usize = 200;

/// 按顺序执行的替换规则：全角空格、Windows 保留字符与控制字符、首尾的点、重复的分隔符
static RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("\u{3000}", " "),
        ("[<>:\"/\\\\|?*\u{0000}-\u{001F}\u{007F}\u{0080}-\u{009F}]+", "_"),
        ("^\\.+|\\.+$", "_"),
        ("_{2,}", "_"),
        (" {2,}", " "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("invalid regex"), replacement))
    .collect()
});

static WINDOWS_RESERVED: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(con|prn|aux|nul|com\\d|lpt\\d)$").expect("invalid regex"));

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '_')
}

/// 把相册标题转换为可以直接落盘的文件名（不含扩展名）
pub fn filenamify(title: &str) -> String {
    let mut name = title.trim().to_string();
    for (re, replacement) in RULES.iter() {
        name = re.replace_all(&name, *replacement).into_owned();
    }

    let mut name = match trim_separators(&name) {
        "" => "unnamed".to_string(),
        trimmed => trimmed.to_string(),
    };
    if WINDOWS_RESERVED.is_match(&name.to_lowercase()) {
        name.push('_');
    }

    // 按字符截断，不会切开多字节字符
    if name.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = name.chars().take(MAX_TITLE_CHARS).collect();
        name = trim_separators(&truncated).to_string();
    }
    name
}
