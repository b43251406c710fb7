use weft::MapContext;
use weft_testing::*;

fn context() -> MapContext {
    MapContext::new()
        .with("n", 7)
        .with("half", 0.5)
        .with("word", "abc")
        .with("digits", "12")
        .with("nums", vec![3, 1, 2])
}

test_suite![
    options(TestOption::Context(context)),
    render_tests(
        (addition, "#set($x = 1 + 2)$x", "3"),
        (precedence, "#set($x = 1 + 2 * 3)$x", "7"),
        (parentheses, "#set($x = (1 + 2) * 3)$x", "9"),
        (left_associative_subtraction, "#set($x = 10 - 3 - 2)$x", "5"),
        (modulo, "#set($x = $n % 4)$x", "3"),
        (integer_division_truncates, "#set($x = $n / 2)$x", "3"),
        (negative_division_truncates, "#set($x = -$n / 2)$x", "-3"),
        (float_arithmetic, "#set($x = $half * 3)$x", "1.5"),
        (whole_float_keeps_point, "#set($x = $half * 2)$x", "1.0"),
        (unary_minus, "#set($x = -(2 + 3))$x", "-5"),
        (string_plus_number, "#set($x = $word + $n)$x", "abc7"),
        (number_plus_string, "#set($x = $n + $word)$x", "7abc"),
        (equality_across_kinds, "#if($digits == 12)same#end", "same"),
        (float_equals_int, "#if(2.0 == 2)same#end", "same"),
        (string_ordering, "#if('apple' lt 'banana')yes#end", "yes"),
        (word_comparisons, "#if($n gt 1 and $n le 7 and $n ne 8 and $n eq 7)yes#end", "yes"),
        (or_short_circuits, "#if(true || $missing.method())yes#end", "yes"),
        (and_short_circuits, "#if(false && $missing.method())yes#else no#end", " no"),
        (empty_string_is_truthy, "#if('')yes#end", "yes"),
        (zero_is_truthy, "#if(0)yes#end", "yes"),
        (false_is_falsy, "#if(false)yes#else no#end", " no"),
        (dollar_before_bracket_is_text, "$[1..4]", "$[1..4]"),
        (range_in_set, "#set($r = [1..4])$r", "[1, 2, 3, 4]"),
        (range_descending, "#set($r = [2..-1])$r", "[2, 1, 0, -1]"),
        (range_single, "#set($r = [5..5])$r", "[5]"),
        (range_from_references, "#set($r = [$n..9])$r", "[7, 8, 9]"),
        (range_from_numeric_string, "#set($r = [$digits..13])$r", "[12, 13]"),
        (empty_list, "#set($l = [])$l.size()", "0"),
        (nested_list, "#set($l = [[1, 2], [3]])$l[0][1]$l[1]", "2[3]"),
        (map_preserves_order, "#set($m = {'z': 1, 'a': 2})$m", "{z=1, a=2}"),
        (map_with_computed_key, "#set($k = 'key')#set($m = {$k: $n})$m.key", "7"),
        (map_get_method, "#set($m = {'a': 'x'})$m.get('a')", "x"),
        (map_contains_key, "#set($m = {'a': 1})$m.containsKey('a')", "true"),
        (list_methods, "$nums.size() $nums.get(0) $nums.contains(2)", "3 3 true"),
        (double_quoted_interpolates, "#set($s = \"n is $n\")$s", "n is 7"),
        (double_quoted_method, "#set($s = \"${word.toUpperCase()}!\")$s", "ABC!"),
        (double_quoted_with_macro, "#macro(twice $v)$v$v#end#set($s = \"#twice('ab')\")$s", "abab"),
        (single_quoted_is_literal, "#set($s = '$n')$s", "$n"),
        (double_quoted_without_markup, "#set($s = \"plain\")$s", "plain"),
        (interpolated_argument, "$word.concat(\"-$n\")", "abc-7"),
        (boolean_literals, "#set($t = true)#set($f = false)$t $f", "true false"),
    ),
    diagnostic_tests(
        (division_by_zero, "#set($x = 1 / 0)[$!x]", "[]"),
        (modulo_by_zero, "#set($x = 1 % 0)[$!x]", "[]"),
        (overflow, "#set($x = 9223372036854775807 + 1)[$!x]", "[]"),
        (multiply_string, "#set($x = 'a' * 2)[$!x]", "[]"),
        (compare_incomparable, "#if('a' < 1)yes#else no#end", " no"),
        (compare_undefined, "#if($missing > 1)yes#else no#end", " no"),
        (negate_string, "#set($x = -'a')[$!x]", "[]"),
        (range_with_non_integer, "#set($r = ['a'..2])[$!r]", "[]"),
        (undefined_list_element_is_skipped, "#set($l = [1, $missing, 3])$l", "[1, 3]"),
        (undefined_map_value_is_skipped, "#set($m = {'a': $missing, 'b': 2})$m", "{b=2}"),
        (undefined_inside_string_literal, "#set($s = \"[$missing]\")$s", "[$missing]"),
    ),
    failure_tests(
        (unterminated_list, "#set($l = [1, 2)"),
        (unterminated_map, "#set($m = {'a': 1)"),
        (map_without_colon, "#set($m = {'a' 1})"),
        (integer_out_of_range, "#set($x = 99999999999999999999)"),
        (dangling_operator, "#set($x = 1 +)"),
        (unterminated_string, "#set($x = 'abc)"),
    ),
];
