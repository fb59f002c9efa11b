use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::error;

/// How a pattern's matches are turned into hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Count {
    /// Every occurrence is a hit.
    All,
    /// Any occurrence is a single hit.
    Once,
    /// The first occurrence scores one hit for the whole match plus one per
    /// capture group.
    First,
}

#[derive(Debug, Clone, Copy)]
struct PatternSpec {
    source: &'static str,
    weight: u32,
    count: Count,
}

const fn all(source: &'static str, weight: u32) -> PatternSpec {
    PatternSpec {
        source,
        weight,
        count: Count::All,
    }
}

const fn once(source: &'static str, weight: u32) -> PatternSpec {
    PatternSpec {
        source,
        weight,
        count: Count::Once,
    }
}

const fn first(source: &'static str, weight: u32) -> PatternSpec {
    PatternSpec {
        source,
        weight,
        count: Count::First,
    }
}

#[derive(Debug)]
pub(crate) struct Pattern {
    pub(crate) regex: Regex,
    pub(crate) weight: u32,
    pub(crate) count: Count,
}

impl Pattern {
    pub(crate) fn hits(&self, text: &str) -> u32 {
        match self.count {
            Count::All => self.regex.find_iter(text).count() as u32,
            Count::Once => u32::from(self.regex.is_match(text)),
            Count::First if self.regex.is_match(text) => self.regex.captures_len() as u32,
            Count::First => 0,
        }
    }

    pub(crate) fn score(&self, text: &str) -> u32 {
        self.hits(text) * self.weight
    }
}

/// Weighted patterns for a single target language.
#[derive(Debug)]
pub struct LanguageProfile {
    key: &'static str,
    pub(crate) patterns: Vec<Pattern>,
}

impl LanguageProfile {
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn score(&self, text: &str) -> u32 {
        self.patterns.iter().map(|pattern| pattern.score(text)).sum()
    }
}

const ENGLISH: &[PatternSpec] = &[
    once(
        r"\b(the|be|to|of|and|a|in|that|have|it|for|not|on|with|he|as|you|do|at|this|but|his|by|from|they|we|say|her|she|or|an|will|my|one|all|would|there|their|what|so|up|out|if|about|who|get|which|go|me|when|make|can|like|time|no|just|him|know|take|people|into|year|your|good|some|could|them|see|other|than|then|now|look|only|come|its|over|think|also|back|after|use|two|how|our|work|first|well|way|even|new|want|because|any|these|give|day|most|us)\b",
        2,
    ),
    once(
        r"\b(hello|hi|hey|goodbye|bye|thanks|thank you|please|yes|no|sorry|excuse me|good morning|good night|how are you|what's up|nice to meet you)\b",
        2,
    ),
    once(r"\b(\w+ed|\w+ing|\w+s)\b|'s\b|'re\b|'ll\b|'ve\b|n't\b", 1),
    once(
        r"^(what|where|when|why|how|who|which|whose|do|does|did|can|could|will|would|should|may|might|must|is|are|was|were|have|has|had)\b.*\?$",
        1,
    ),
];

const CREOLE: &[PatternSpec] = &[
    first(
        r"\b(bonjou|bonswa|koman|kouman|sak pase|mèsi|mersi|anpil|souple|wi|non|ale|kite|vini|prale|soti|nan|lakay|timoun|fanm|gason|manje|dlo|solèy|lalin|jwe|chante|danse|travay|dòmi|se|pou|ak|pa|toujou|sou|anba|devan|dèyè|bò|kote|lè|jou|swa|maten|aswè|lendi|madi|mèkredi|jedi|vandredi|samdi|dimanch|mwen|ou|li|nou|yo)\b",
        2,
    ),
    first(r"\b(se|ki|te|ap|ta|kon|fòk|dwe)\s+\w+", 2),
    all(r"[àáâäãåāèéêëēìíîïīòóôöõōùúûüūǜýÿ]", 1),
    first(r"\b\w+(ye|yo|an|ou|en|on)\b", 1),
];

const CHINESE: &[PatternSpec] = &[
    all(r"[\x{4e00}-\x{9fff}]", 2),
    first(
        r"(你好|谢谢|再见|请|不是|怎么样|你好吗|今天|明天|昨天|我们|他们|这个|那个|什么|为什么|哪里|什么时候|多少)",
        2,
    ),
    first(
        r"\b(wǒ|hěn|hǎo|xièxiè|zàijiàn|qǐng|shì|búshì|zěnmeyàng|jīntiān|míngtiān|zuótiān|wǒmen|tāmen|zhège|nàge|shénme|wèishénme|nǎlǐ|duōshǎo)\b",
        1,
    ),
];

const CANTONESE: &[PatternSpec] = &[
    all(r"[\x{4e00}-\x{9fff}]", 2),
    first(
        r"(早晨|多謝|唔該|係|唔係|點解|邊度|做乜|食飯|飲茶|返工|放工|鍾意|唔鍾意|對唔住|冇問題|得嘞|拜拜|佢|嘅|咗)",
        2,
    ),
    first(
        r"\b(nei5 hou2|zou2 san4|do1 ze6|m4 goi1|hai6|m4 hai6|dim2 gaai2|bin1 dou6|zou6 mat1|sik6 faan6|jam2 caa4|faan1 gung1|fong3 gung1|zung1 ji3|deoi3 m4 zyu6|mou5 man6 tai4|dak1 laak3|baai1 baai3)\b",
        1,
    ),
];

const ALBANIAN: &[PatternSpec] = &[
    first(
        r"\b(përshëndetje|mirëmëngjes|mirupafshim|faleminderit|tungjatjeta|po|jo|ju lutem|si je|si jeni|qyteti|mirëdita|mirëmbrëma|natën e mirë|punë|shtëpi|familja|miq|dashuri|paqja|liri|bashkimi|pavarësia|shqip|shqipëria|tiranë|durrës|vlorë|unë|ti|ai|ajo|ne|ata|ato|ky|kjo|këta|këto)\b",
        2,
    ),
    all(r"[ëç]", 2),
    first(
        r"\b(jam|jeni|është|kemi|keni|ka|kanë|bëj|bën|bëjmë|bëni|bëjnë|kam|ke|flas|flet|flasin|them|thoni|thotë|duke|që|për|me|pa|në|deri|nga|tek|së|të|janë|ishte|ishin)\b",
        1,
    ),
];

const SAMOAN: &[PatternSpec] = &[
    first(
        r"\b(talofa|mālō|faʻafetai|faafetai|faʻamolemole|lelei|tamaiti|tama|tamaʻitaʻi|saʻo|faʻatau|pepē|alofa|manu|vai|lā|pō|masina|fale|nuʻu|tagata|tamāloa|fafine|toʻalua|aiga|gāluega)\b",
        2,
    ),
    all(r"[āēīōū]", 2),
    all(r"ʻ", 1),
    first(
        r"\b(ou|lo|lana|latou|tātou|matou|lua|lau|tolu|fā|lima|ono|fitu|valu|iva|sefulu)\b",
        1,
    ),
];

const ARAMAIC: &[PatternSpec] = &[
    all(r"[\x{0700}-\x{074F}\x{0840}-\x{085F}]", 2),
    first(
        r"\b(ܫܠܡܐ|ܥܠܝܟ|ܐܠܗܐ|ܐܢܐ|ܐܢܬܐ|ܐܒܐ|ܐܡܐ|ܚܙܐ|ܐܟܪ|ܐܡܪ|ܡܠܟܐ|ܕܝܢܐ|ܐܪܥܐ|ܫܡܝܐ|ܒܪܐ|ܒܪܬܐ|ܐܚܐ|ܐܚܬܐ|ܟܕܡ|ܟܕܡܬܐ)\b",
        2,
    ),
    all(r"[ܐܒܓܕܗܘܙܚܛܝܟܠܡܢܣܥܦܨܩܪܫܬ]", 1),
];

const BAYBAYIN: &[PatternSpec] = &[
    all(r"[\x{1700}-\x{171F}]", 2),
    all(r"[\x{1720}-\x{173F}]", 2),
];

const CUNEIFORM: &[PatternSpec] = &[
    all(r"[\x{12000}-\x{123FF}\x{12400}-\x{1247F}]", 2),
    all(r"[\x{12480}-\x{1254F}]", 2),
];

const GASTER: &[PatternSpec] = &[
    all(r"[\x{2600}-\x{2603}\x{2744}\x{2605}\x{2606}\x{263D}\x{263E}\x{2660}-\x{2667}]", 2),
    all(r"[\x{2654}-\x{265F}]", 2),
    all(r"[\x{2669}-\x{266F}]", 1),
    all(r"[\x{2700}-\x{27BF}]", 1),
];

const VALYRIAN: &[PatternSpec] = &[
    all(
        r"\b(valar|morghulis|dohaeris|ziry|kostilus|kirimvose|lēkia|āeha|uēny|jaelan|va|daor|muña|kepa|vīl|bē|pās|zȳhon|qogralar|kelīrēs|ȳdras|jēda|mērī|skoros|ñuhoso|aelia|vējos|dārys|valonqar|rȳbā|minides|pōja|vēz|mandia|issa|vōlor|jemē|zȳrys|ghesper|mazembar|vōdis|gēlion|rhaes|aeksia|ȳdra|dārā|vāedar|qorrion|lanna|zokla|vēzmen|kelī|tubī|zȳri|kessa|lia|vēzo|gīda|jikagon|keligon|ōñon|dovaogēdy|rytsas|kesys|skorosi|zaldrīzes|valyrio|muño|ēlies|hen|qogralbar|mazverdāghes|gēlenka|irge|zōbrie|jelmāzo|bantis|prōmphas|gevī|rȳnytsia|ñuhor|tobē|vēzos|kelīrīs|dōrī|jikāgon|ao|daorun|qogror|ñuha|vok|vaesis|jelmā|sōvēs|pāvot|uēpa|ola|ñuqae|kostilā|valōqas|ullus|qorrbor)\b",
        5,
    ),
    all(r"[āēīōūȳ]", 4),
    all(r"\b(ks|gh|zh|rh|mb|nd|ng|st|th|sh|ch|qu|ph|kh)\b", 1),
];

const GREEK: &[PatternSpec] = &[
    all(r"[\x{0370}-\x{03FF}\x{1F00}-\x{1FFF}]", 2),
    first(
        r"\b(χαῖρε|εὖγε|νῦν|οὐ|μή|ἐγώ|σύ|αὐτός|αὐτή|αὐτό|οὗτος|αὕτη|τοῦτο|τίς|τί|ποῦ|πόθεν|πότε|πῶς|ἵνα|ὅτι|ὡς|γάρ|δέ|τε|μήν|ἀλλά|οὖν|μέν|καί|ἤ|εἰ|ἐάν|ἄν|οὐκ|οὐχ|οὐχί)\b",
        2,
    ),
    all(r"[αβγδεζηθικλμνξοπρστυφχψω]", 1),
];

const MIDDLE_ENGLISH: &[PatternSpec] = &[
    first(
        r"\b(knyght|sweorde|godes|soule|herte|lufe|freond|fader|moder|suster|dohter|kynge|quene|lorde|childe|chirche|heuen|helle|lyf|deth|tyme|nyght|mone|sterre|fyer|erthe|wynd|reyn|bok|musike|speche|sotil|gret|longe|hye|whyte|blake|reede|grene|blewe|selver|yren|ston|flour|fruyt|bred|wyn|fleshe|fishe|foul|cowe|dogge|brid|snak|appel|pere|sugre|hony|melk|chese|egge|ryce|wheate|spice|gynger|canel)\b",
        2,
    ),
    first(
        r"\b(thou|thee|thy|thine|ye|oure|hath|doth|didst|hadst|shalt|shouldst|wilt|wouldst|art|wert|wast|weren|canst|couldst|mayst|mightst|nere|nolde|wolde|sholde|kouthe|koude|durst|dorste|myste|myghte|wost|wyste|wiste|wot|whilom|sithen|whanne|whan|thanne|therto|forthi|forwhy|bifore|aftur|fro|wyth|oute|atwix|betwix|amonges|agayns|ayeyns|ayeyn|agayn|whil|tille|riht|yat|yit|nat)\b",
        2,
    ),
    first(
        r"\b(bith|beth|han|hast|haven|haddest|hadde|sholdest|wolt|wold|couth|couthe|mighte|moste|oughte)\b",
        1,
    ),
    all(r"\b\w+eth\b", 1),
    all(r"[æðþȝ]", 1),
];

const ESPERANTO: &[PatternSpec] = &[
    first(
        r"\b(saluton|dankon|bonvolu|jes|ne|mi|vi|li|ŝi|ĝi|ni|ili|la|de|da|en|al|sur|sub|inter|kun|sen|anstataŭ|krom|por|dum|antaŭ|post|ĉe|trans|tra|ĝis|je|pri|kaj|sed|aŭ|ke|se|kvankam|ĉar|tial|tiam|kiam|kie|kien|kiel|kiom|kiu|kio|kia|kies|ĉiu|ĉio|ĉia|ĉies|neniu|nenio|nenia|ĉi|tiu|tio|tia|ties|estas|estis|estos|estus|havas|havis|havos|havus|faras|faris|faros|farus|iras|iris|iros|irus|venas|venis|venos|venus|parolas|parolis|parolos|parolus|vidas|vidis|vidos|vidus|skribas|skribis|skribos|skribus)\b",
        2,
    ),
    all(r"[ĉĝĥĵŝŭ]", 5),
    all(r"\b\w+(oj|aj|ojn|ajn)\b", 1),
    first(r"\b(mal|ge|re|dis|ek|for|pra)\w+", 1),
    first(
        r"\b(bon|bel|nova|granda|malgranda|juna|maljuna|forta|malforta|varma|malvarma|vera|malvera|facila|malfacila|laboras|laboris|laboros|laborus|studas|studis|studos|studus|manĝas|manĝis|manĝos|manĝus|trinkas|trinkis|trinkos|trinkus|dormas|dormis|dormos|dormus)\b",
        1,
    ),
];

const AL_BHED: &[PatternSpec] = &[
    first(
        r"\b(oui|fam|damma|dra|yht|e'syd|kuut|pa|dreo|muja|ruf|bnehda|myhki|vun|du|cusa|yhm|cud)\b",
        2,
    ),
    all(r"\b\w*(yh|ao|oa|uo|xy|qy)\w*\b", 2),
];

const PIG_LATIN: &[PatternSpec] = &[
    all(r"\b\w*[bcdfghjklmnpqrstvwxyz]ay\b", 2),
    all(r"\b[aeiou]\w*way\b", 2),
];

fn specs(key: &str) -> &'static [PatternSpec] {
    match key {
        "english" => ENGLISH,
        "creole" => CREOLE,
        "chinese" => CHINESE,
        "cantonese" => CANTONESE,
        "albanian" => ALBANIAN,
        "samoan" => SAMOAN,
        "aramaic" => ARAMAIC,
        "baybayin" => BAYBAYIN,
        "cuneiform" => CUNEIFORM,
        "gaster" => GASTER,
        "valyrian" => VALYRIAN,
        "greek" => GREEK,
        "middle-english" => MIDDLE_ENGLISH,
        "esperanto" => ESPERANTO,
        "al-bhed" => AL_BHED,
        "pig-latin" => PIG_LATIN,
        _ => &[],
    }
}

/// Keys of the built-in target profiles.
pub const PROFILE_KEYS: &[&str] = &[
    "creole",
    "chinese",
    "cantonese",
    "albanian",
    "samoan",
    "aramaic",
    "baybayin",
    "cuneiform",
    "gaster",
    "valyrian",
    "greek",
    "middle-english",
    "esperanto",
    "al-bhed",
    "pig-latin",
];

fn compile(key: &'static str) -> LanguageProfile {
    let patterns = specs(key)
        .iter()
        .filter_map(|spec| match Regex::new(spec.source) {
            Ok(regex) => Some(Pattern {
                regex,
                weight: spec.weight,
                count: spec.count,
            }),
            Err(err) => {
                error!("invalid detection pattern for {}: {}", key, err);
                None
            }
        })
        .collect();
    LanguageProfile { key, patterns }
}

fn registry() -> &'static HashMap<&'static str, LanguageProfile> {
    static PROFILES: OnceLock<HashMap<&'static str, LanguageProfile>> = OnceLock::new();
    PROFILES.get_or_init(|| {
        std::iter::once("english")
            .chain(PROFILE_KEYS.iter().copied())
            .map(|key| (key, compile(key)))
            .collect()
    })
}

pub(crate) fn english() -> &'static LanguageProfile {
    profile("english").unwrap_or_else(|| empty())
}

/// Looks up a target profile. Unknown keys have no profile.
pub fn profile(key: &str) -> Option<&'static LanguageProfile> {
    registry().get(key)
}

pub(crate) fn empty() -> &'static LanguageProfile {
    static EMPTY: LanguageProfile = LanguageProfile {
        key: "",
        patterns: Vec::new(),
    };
    &EMPTY
}
