/// Builds the recent-search query covering originals, replies, quotes and retweets of posts
/// carrying any of `hashtags` (whitespace separated, `#` optional) and, when set, the mention.
pub fn build_query(hashtags: &str, mention: &str) -> String {
    let tags = hashtags
        .split_whitespace()
        .map(|t| {
            if t.starts_with('#') {
                t.to_owned()
            } else {
                format!("#{t}")
            }
        })
        .collect::<Vec<_>>()
        .join(" OR ");

    let mention = mention.trim();
    let base = if mention.is_empty() {
        format!("({tags})")
    } else {
        format!("({tags}) {mention}")
    };

    format!(
        "({base} -is:reply -is:quote -is:retweet) OR ({base} is:reply) OR ({base} is:quote) OR ({base} is:retweet)"
    )
}
