//! End-to-end runs of complete programs through the whole pipeline.

use minic::{CodeGen, Lexer, Parser, Sema};
use vm::Vm;

fn run(source: &str) -> i32 {
    let tokens = Lexer::new(source).parse();
    let (mut program, errors) = Parser::new(tokens.into_iter()).parse();
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    let mut sema = Sema::new();
    assert!(sema.analyze(&mut program), "sema errors: {:?}", sema.errors());
    let code = CodeGen::generate(&program).expect("codegen failed");
    Vm::new().run(&code).expect("runtime error")
}

#[test]
fn test_bubble_sort_sum_and_max() {
    let source = r#"
int main() {
    int arr[5];
    arr[0] = 5;
    arr[1] = 2;
    arr[2] = 8;
    arr[3] = 1;
    arr[4] = 9;

    int i = 0;
    while (i < 5) {
        int j = 0;
        while (j < 4) {
            if (arr[j] > arr[j + 1]) {
                int temp = arr[j];
                arr[j] = arr[j + 1];
                arr[j + 1] = temp;
            }
            j = j + 1;
        }
        i = i + 1;
    }

    if (arr[0] != 1) return 1;
    if (arr[1] != 2) return 2;
    if (arr[2] != 5) return 3;
    if (arr[3] != 8) return 4;
    if (arr[4] != 9) return 5;

    int sum = 0;
    int k = 0;
    for (k = 0; k < 5; k = k + 1) {
        sum = sum + arr[k];
    }

    int max = arr[0];
    int m = 1;
    while (m < 5) {
        if (arr[m] > max) {
            max = arr[m];
        }
        m = m + 1;
    }

    return sum + max;
}
"#;
    assert_eq!(run(source), 34);
}

#[test]
fn test_recursive_algorithms() {
    let source = r#"
int factorial(int n) {
    if (n <= 1) {
        return 1;
    }
    return n * factorial(n - 1);
}

int fibonacci(int n) {
    if (n <= 1) {
        return n;
    }
    return fibonacci(n - 1) + fibonacci(n - 2);
}

int sum_recursive(int n) {
    if (n <= 0) {
        return 0;
    }
    return n + sum_recursive(n - 1);
}

int main() {
    if (factorial(5) != 120) return 1;
    if (fibonacci(10) != 55) return 2;
    if (sum_recursive(10) != 55) return 3;
    return factorial(5) + fibonacci(10) + sum_recursive(10);
}
"#;
    assert_eq!(run(source), 230);
}

#[test]
fn test_pointer_comprehensive() {
    let source = r#"
void swap(int* a, int* b) {
    int temp = *a;
    *a = *b;
    *b = temp;
}

int main() {
    int x = 10;
    int* p = &x;
    *p = 20;
    if (x != 20) return 1;

    int** pp = &p;
    **pp = 30;
    if (x != 30) return 2;
    if (*p != 30) return 3;

    int a = 100;
    int b = 200;
    swap(&a, &b);
    if (a != 200) return 4;
    if (b != 100) return 5;

    int y = 50;
    int* ptr = &y;
    *ptr = 60;
    if (y != 60) return 6;

    **pp = 70;
    if (x != 70) return 7;

    return 0;
}
"#;
    assert_eq!(run(source), 0);
}

#[test]
fn test_nested_scopes_with_shadowing() {
    let source = r#"
int main() {
    int x = 10;
    int y = 20;
    int z = 0;

    {
        int x = 100;
        int w = 5;

        if (x != 100) return 1;
        if (y != 20) return 2;

        {
            int x = 1000;
            int y = 200;
            int v = 10;

            if (x != 1000) return 3;
            if (y != 200) return 4;
            if (w != 5) return 5;
            if (v != 10) return 6;

            z = x + y + w + v;

            {
                int a = x / 10;
                int b = y / 10;
                z = z + a + b;
            }

            if (x != 1000) return 7;
        }

        if (x != 100) return 8;
        if (y != 20) return 9;
    }

    if (x != 10) return 10;
    if (y != 20) return 11;
    if (z != 1335) return 12;

    int result = 0;
    {
        int a = 1;
        {
            int b = 2;
            {
                int c = 3;
                {
                    int d = 4;
                    result = a + b + c + d;
                }
            }
        }
    }

    if (result != 10) return 13;

    return x + y + z + result;
}
"#;
    assert_eq!(run(source), 1375);
}

#[test]
fn test_global_pointer_rebinding() {
    let source = r#"
int global_x = 100;
int global_y = 200;
int* global_ptr = &global_y;

int main() {
    global_ptr = &global_x;
    if (*global_ptr != 100) return 1;

    *global_ptr = 200;
    if (global_x != 200) return 2;

    global_ptr = &global_y;
    if (*global_ptr != 200) return 3;

    *global_ptr = 300;
    if (global_y != 300) return 4;

    int local_z = 400;
    global_ptr = &local_z;
    if (*global_ptr != 400) return 5;

    *global_ptr = 500;
    if (local_z != 500) return 6;

    return 0;
}
"#;
    assert_eq!(run(source), 0);
}

#[test]
fn test_extended_global_initialization() {
    let source = r#"
int basic = 42;

int expr_add = 10 + 20;
int expr_mul = 5 * 6;
int expr_complex = (10 + 5) * 2 - 3;

int cmp_result = 10 < 20;
int logic_and = (5 > 3) && (10 == 10);
int logic_or = (1 == 2) || (3 < 5);
int logic_not = !(0);

int negative = -100;
int neg_expr = -(10 + 5);

int target1 = 999;
int target2 = 888;
int *ptr1 = &target1;
int *ptr2 = &target2;

int uninitialized;
int arr[3];

int main() {
    if (basic != 42) return 1;

    if (expr_add != 30) return 2;
    if (expr_mul != 30) return 3;
    if (expr_complex != 27) return 4;

    if (cmp_result != 1) return 5;
    if (logic_and != 1) return 6;
    if (logic_or != 1) return 7;
    if (logic_not != 1) return 8;

    if (negative != -100) return 9;
    if (neg_expr != -15) return 10;

    if (*ptr1 != 999) return 11;
    if (*ptr2 != 888) return 12;

    *ptr1 = 111;
    *ptr2 = 222;
    if (target1 != 111) return 13;
    if (target2 != 222) return 14;

    if (uninitialized != 0) return 15;
    if (arr[0] != 0) return 16;
    if (arr[1] != 0) return 17;
    if (arr[2] != 0) return 18;

    return 0;
}
"#;
    assert_eq!(run(source), 0);
}

#[test]
fn test_pointer_identities() {
    let source = r#"
int main() {
    int x = 41;
    if (*&x != 41) { return 1; }

    int arr[5];
    arr[2] = 9;
    int* p = &arr[0];
    int* q = &arr[2];
    if (p + 2 != q) { return 2; }
    if (*q != 9) { return 3; }
    return 0;
}
"#;
    assert_eq!(run(source), 0);
}

#[test]
fn test_multi_dimensional_array() {
    let source = r#"
int main() {
    int grid[3][4];
    int i = 0;
    while (i < 3) {
        int j = 0;
        while (j < 4) {
            grid[i][j] = i * 4 + j;
            j = j + 1;
        }
        i = i + 1;
    }
    return grid[2][3] * 10 + grid[1][2];
}
"#;
    // grid[2][3] = 11, grid[1][2] = 6
    assert_eq!(run(source), 116);
}
