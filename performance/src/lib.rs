use rand::prelude::Distribution;
use rand::Rng;
use weft::{MapContext, Value};

static RANDOM_WORDS: [&str; 12] = [
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor",
];

/// Text using `$` and `#` in ways that are neither references nor directives.
static RANDOM_SYMBOLS: [&str; 8] = [
    "$5 ", "# ", "#333; ", "100$ ", "50% ", " (a, b) ", " [1..2] ", "a@b.c ",
];

static RANDOM_REFERENCES: [&str; 10] = [
    "$name",
    "$!name",
    "${name}",
    "$user.name",
    "$user.email.toUpperCase()",
    "$items.size()",
    "$items[0]",
    "$name.substring(1, 3)",
    "\\$name",
    "$undefined",
];

pub struct Weights {
    pub text: u32,
    pub space: u32,
    pub newline: u32,
    pub symbol: u32,
    pub reference: u32,
    pub condition: u32,
    pub loop_: u32,
    pub set: u32,
    pub comment: u32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            text: 200,
            space: 60,
            newline: 10,
            symbol: 4,
            reference: 40,
            condition: 5,
            loop_: 3,
            set: 5,
            comment: 2,
        }
    }
}

impl Weights {
    /// Weights for documents that contain no reference or directive syntax.
    pub fn text_only() -> Self {
        Self {
            reference: 0,
            condition: 0,
            loop_: 0,
            set: 0,
            comment: 0,
            ..Default::default()
        }
    }
}

/// The context that random templates are rendered against.
pub fn sample_context() -> MapContext {
    MapContext::new()
        .with("name", "Weft")
        .with(
            "user",
            [
                ("name", Value::from("Ada")),
                ("email", Value::from("ada@example.com")),
            ]
            .into_iter()
            .collect::<Value>(),
        )
        .with("items", vec!["one", "two", "three", "four"])
}

/// Generate a random template of approximately `length` bytes.
///
/// The template always compiles: every directive that opens a block is closed on the spot.
pub fn generate_random_template(
    rng: &mut rand::prelude::StdRng,
    length: usize,
    weights: &Weights,
) -> String {
    let dist = rand::distributions::WeightedIndex::new([
        weights.text,
        weights.space,
        weights.newline,
        weights.symbol,
        weights.reference,
        weights.condition,
        weights.loop_,
        weights.set,
        weights.comment,
    ])
    .unwrap();
    let mut result = String::with_capacity(length + 100);
    if weights.comment > 0 {
        result.push_str("## This template was randomly generated.\n");
    }
    while result.len() < length {
        let temp;
        let s = match dist.sample(rng) {
            0 => RANDOM_WORDS[rng.gen_range(0..RANDOM_WORDS.len())],
            1 => " ",
            2 => "\n",
            3 => RANDOM_SYMBOLS[rng.gen_range(0..RANDOM_SYMBOLS.len())],
            4 => RANDOM_REFERENCES[rng.gen_range(0..RANDOM_REFERENCES.len())],
            5 => match rng.gen_range(0..3) {
                0 => "#if($user.name == 'Ada')yes#else no#{end}",
                1 => "#if($items.size() > 3 && $name)many#{end}",
                _ => "#if(!$undefined)#{else}never#{end}",
            },
            6 => "#foreach($item in $items)$item#if($foreach.hasNext), #end#{end}",
            7 => {
                temp = format!(
                    "#set($n = {} * {} + $items.size())$n",
                    rng.gen_range(0..100),
                    rng.gen_range(0..100)
                );
                &temp
            }
            _ => "#* a comment *#",
        };
        result.push_str(s);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use weft::Engine;

    #[test]
    fn plain_text_renders_unchanged() {
        let engine = Engine::new();
        let mut rng = rand::prelude::StdRng::seed_from_u64(19);
        for i in 0..40 {
            let source = generate_random_template(&mut rng, 2_000, &Weights::text_only());
            assert!(!source.starts_with("##"));
            let template = engine.compile(&format!("text{i}"), &source).unwrap();
            let output = engine
                .render_to_string(&template, &mut MapContext::new())
                .unwrap();
            assert_eq!(output, source);
        }
    }

    #[test]
    fn random_templates_compile() {
        let engine = Engine::new();
        let mut rng = rand::prelude::StdRng::seed_from_u64(23);
        for i in 0..20 {
            let source = generate_random_template(&mut rng, 2_000, &Weights::default());
            let template = engine.compile(&format!("random{i}"), &source).unwrap();
            engine
                .render_to_string(&template, &mut sample_context())
                .unwrap();
        }
    }
}
