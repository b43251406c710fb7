use weft::MapContext;
use weft_testing::*;

fn context() -> MapContext {
    MapContext::new()
        .with("name", "shared")
        .with("words", vec!["alpha", "beta", "gamma"])
}

static RESOURCES: &[(&str, &str)] = &[("row.wft", "<$x:$w>")];

test_suite![
    options(
        TestOption::Context(context),
        TestOption::Resources(RESOURCES),
    ),
    concurrency_tests(
        (binding_per_thread, "$x", 16),
        (methods_on_shared_nodes, "$name.toUpperCase()$x.toString().length()", 8),
        (loops, "#foreach($i in [1..3])$x.toString()$i#end", 8),
        (loop_state, "#foreach($w in $words)$foreach.index$w.charAt(0)#end/$x", 8),
        (macros, "#macro(tag $v)<$v>#end#tag($x)#tag($name)", 8),
        (set_is_private, "#set($y = $x * 2)$y", 16),
        (string_literals, "#set($s = \"x=$x\")$s", 8),
        (parse, "#foreach($w in $words)#parse('row.wft')#end", 8),
        (conditions, "#if($x % 2 == 0)even#else odd#end", 16),
    ),
];
