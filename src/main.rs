fn main() {
    graphene_lib::run()
}
