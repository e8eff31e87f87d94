//! Built-in content: the topic catalogue, mixed-practice prompts and the
//! pre-authored fallback questions that keep the quiz usable without the remote generator.

use crate::domain::{Difficulty, QuestionTemplate, Topic, TopicCategory, MIXED_TOPIC_ID};

/// Synthetic topic: no fixed category, resolved per request.
pub fn mixed_topic() -> Topic {
  Topic {
    id: MIXED_TOPIC_ID.into(),
    title: "תרגול מעורב (כל הנושאים)".into(),
    category: None,
    description: "שאלות מכל הסוגים בהפתעה!".into(),
  }
}

pub fn seed_topics() -> Vec<Topic> {
  use TopicCategory::*;
  let t = |id: &str, title: &str, category: TopicCategory, description: &str| Topic {
    id: id.into(),
    title: title.into(),
    category: Some(category),
    description: description.into(),
  };
  vec![
    t("decimal-structure", "מבנה עשרוני", WholeNumbers, "ערך הספרה, מבנה המספר ומשמעות המיקום."),
    t("basic-ops", "ארבע פעולות החשבון", WholeNumbers, "חיבור, חיסור, כפל וחילוק במספרים שלמים."),
    t("comparisons", "השוואות", WholeNumbers, "מי גדול יותר? סימני גדול, קטן ושווה."),
    t("order-ops", "סדר פעולות חשבון", WholeNumbers, "חוקי הסדר: סוגריים, כפל וחילוק לפני חיבור וחיסור."),
    t("frac-ident", "זיהוי וכתיבת שברים", Fractions, "זיהוי החלק הצבוע, כתיבה במילים ובספרות."),
    t("frac-convert", "מספרים מעורבים ושברים", Fractions, "הפיכת מספר מעורב לשבר גדול (מדומה) ולהיפך."),
    t("geo-diagonals", "אלכסונים במצולעים", Geometry, "זיהוי אלכסונים, כמה אלכסונים יוצאים מקודקוד?"),
    t("geo-angles", "זוויות ומקבילות", Geometry, "זיהוי זוויות ומקבילות (צלעות מקבילות) במצולעים."),
  ]
}

/// Subjects the mixed topic draws from, one per request.
pub const MIXED_PROMPTS: [&str; 8] = [
  "מבנה עשרוני: ערך הספרה וערך המקום במספרים עד מיליון",
  "ארבע פעולות החשבון: חיבור, חיסור, כפל וחילוק",
  "השוואת מספרים וביטויים חשבוניים (גדול/קטן/שווה)",
  "סדר פעולות חשבון: סוגריים, כפל וחילוק קודמים לחיבור וחיסור",
  "זיהוי שברים וכתיבתם במילים ובספרות",
  "הפיכת מספר מעורב לשבר מדומה (גדול מ-1) ולהפך",
  "אלכסונים במצולעים: תכונות וזיהוי",
  "זוויות ומקבילות במצולעים (מרובעים ומשולשים)",
];

fn q(
  text: &str,
  options: &[&str],
  correct_answer_index: usize,
  explanation: &str,
  difficulty: Difficulty,
  svg: Option<&str>,
) -> QuestionTemplate {
  QuestionTemplate {
    text: text.into(),
    options: options.iter().map(|s| s.to_string()).collect(),
    correct_answer_index,
    explanation: explanation.into(),
    difficulty,
    svg: svg.map(str::to_string),
  }
}

/// Pre-authored questions per category, in a fixed order.
pub fn seed_fallback_questions() -> Vec<(TopicCategory, Vec<QuestionTemplate>)> {
  use Difficulty::*;
  vec![
    (
      TopicCategory::WholeNumbers,
      vec![
        q(
          "פתרו לפי סדר פעולות חשבון: `5 + 3 * 2`",
          &["16", "11", "10", "13"],
          1,
          "כפל קודם לחיבור. קודם מחשבים `3 * 2` (שזה 6), ואז מוסיפים 5. התוצאה היא 11.",
          Medium,
          None,
        ),
        q(
          "מהו ערך הספרה 4 במספר `4,320`?",
          &["4", "40", "400", "4,000"],
          3,
          "הספרה 4 נמצאת במקום האלפים, ולכן ערכה הוא `4,000`.",
          Easy,
          None,
        ),
        q(
          "איזה סימן מתאים? `500 + 50 ___ 600 - 60`",
          &[">", "<", "=", "לא ניתן לדעת"],
          0,
          "`550` גדול מ- `540`. (`500+50=550`, `600-60=540`).",
          Medium,
          None,
        ),
        q(
          "כמה הם `150 / 3`?",
          &["30", "40", "50", "60"],
          2,
          "15 לחלק ל-3 זה 5, ולכן 150 לחלק ל-3 זה 50.",
          Medium,
          None,
        ),
        q(
          "דני קנה 4 חטיפים במחיר 5 שקלים כל אחד. כמה שילם?",
          &["15 שקלים", "20 שקלים", "25 שקלים", "9 שקלים"],
          1,
          "תרגיל כפל פשוט: `4 * 5 = 20`.",
          Easy,
          None,
        ),
      ],
    ),
    (
      TopicCategory::Fractions,
      vec![
        q(
          "הפכו את המספר המעורב 2 וחצי `2 1/2` לשבר גדול",
          &["`3/2`", "`5/2`", "`4/2`", "`2/2`"],
          1,
          "מכפילים את השלם (2) במכנה (2) ומוסיפים את המונה (1). מקבלים 5 חצאים.",
          Medium,
          None,
        ),
        q(
          "איך כותבים \"שלושה רבעים\" במספרים?",
          &["`3/4`", "`4/3`", "34", "4.3"],
          0,
          "3 במונה (למעלה) ו-4 במכנה (למטה).",
          Easy,
          None,
        ),
        q(
          "מהו השבר המשלים ל-1 בשבר `3/5`?",
          &["`1/5`", "`2/5`", "`3/5`", "`4/5`"],
          1,
          "כדי להגיע ל-5/5 (שלם) חסרים לנו 2 חלקים מתוך 5.",
          Easy,
          None,
        ),
        q(
          "כמה הם `3/4 - 1/4`?",
          &["`1/4`", "`1/2`", "`3/4`", "1"],
          1,
          "3 רבעים פחות רבע אחד נשארים 2 רבעים, שזה בדיוק חצי.",
          Medium,
          None,
        ),
      ],
    ),
    (
      TopicCategory::Geometry,
      vec![
        q(
          "כמה אלכסונים יוצאים מקודקוד אחד במרובע?",
          &["1", "2", "3", "0"],
          0,
          "במרובע ניתן למתוח רק אלכסון אחד מכל קודקוד (לקודקוד הנגדי).",
          Medium,
          Some(r##"<svg width="200" height="150" viewBox="0 0 200 150"><rect x="50" y="25" width="100" height="100" stroke="#4F46E5" stroke-width="3" fill="none"/><line x1="50" y1="25" x2="150" y2="125" stroke="#F59E0B" stroke-width="2" stroke-dasharray="5,5"/></svg>"##),
        ),
        q(
          "איזה זוג צלעות במלבן הן מקבילות?",
          &["צלעות סמוכות", "צלעות נגדיות", "אין צלעות מקבילות", "האלכסונים"],
          1,
          "במלבן (ובכל מקבילית), הצלעות הנגדיות מקבילות זו לזו.",
          Easy,
          Some(r##"<svg width="200" height="150" viewBox="0 0 200 150"><rect x="40" y="40" width="120" height="70" stroke="#4F46E5" stroke-width="3" fill="#E0E7FF"/><path d="M40 40 L160 40" stroke="#10B981" stroke-width="4"/><path d="M40 110 L160 110" stroke="#10B981" stroke-width="4"/></svg>"##),
        ),
        q(
          "איך מחשבים שטח מלבן?",
          &["אורך ועוד רוחב", "אורך כפול רוחב", "אורך כפול 2", "רוחב כפול 2"],
          1,
          "נוסחת שטח מלבן היא צלע כפול הצלע הסמוכה לה (אורך כפול רוחב).",
          Medium,
          Some(r##"<svg width="200" height="150" viewBox="0 0 200 150"><rect x="50" y="50" width="100" height="50" stroke="#4F46E5" stroke-width="3" fill="none"/><text x="100" y="45" text-anchor="middle" font-size="14">אורך</text><text x="35" y="80" text-anchor="middle" font-size="14" transform="rotate(-90, 35, 80)">רוחב</text></svg>"##),
        ),
        q(
          "כמה זוויות יש במשולש?",
          &["2", "3", "4", "1"],
          1,
          "במשולש יש 3 זוויות (ו-3 צלעות).",
          Easy,
          Some(r##"<svg width="200" height="150" viewBox="0 0 200 150"><polygon points="100,20 40,130 160,130" stroke="#4F46E5" stroke-width="3" fill="none"/><circle cx="100" cy="20" r="5" fill="#EF4444"/><circle cx="40" cy="130" r="5" fill="#EF4444"/><circle cx="160" cy="130" r="5" fill="#EF4444"/></svg>"##),
        ),
      ],
    ),
  ]
}
